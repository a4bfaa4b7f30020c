//! Native kernel error codes.
//!
//! A uC/OS kernel reports the outcome of every service through an `OS_ERR` out-parameter.
//! [`ErrorCode`] is the closed set of those codes a [`NativeKernel`] implementation may report;
//! `OS_ERR_NONE` is expressed as `Ok(..)`.
//!
//! [`NativeKernel`]: crate::NativeKernel

/// Type alias for Result with [`ErrorCode`] as the error type.
pub type Result<T, E = ErrorCode> = core::result::Result<T, E>;

/// Error codes reported by the native kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The kernel has not been initialized.
    #[error("OS not initialized")]
    OsNotInit,
    /// The service requires the kernel to be running.
    #[error("OS not running")]
    OsNotRunning,
    /// The kernel has already been started.
    #[error("OS already running")]
    OsRunning,

    /// A bounded pend expired before the object was signalled.
    #[error("Pend timeout")]
    Timeout,
    /// The pend was aborted.
    #[error("Pend aborted")]
    PendAbort,
    /// A blocking pend was attempted from interrupt context.
    #[error("Pend from ISR")]
    PendIsr,
    /// A blocking pend was attempted while the scheduler is locked.
    #[error("Pend while scheduler locked")]
    PendLocked,
    /// A non-blocking pend found the object unavailable.
    #[error("Pend would block")]
    PendWouldBlock,

    /// The object was deleted while the caller was pending on it.
    #[error("Object deleted")]
    ObjDel,
    /// The handle does not refer to a live object.
    #[error("Null object")]
    ObjPtrNull,
    /// The handle refers to an object of another type.
    #[error("Wrong object type")]
    ObjType,
    /// An invalid option was passed to the service.
    #[error("Invalid option")]
    OptInvalid,
    /// The kernel ran out of control blocks for the requested object kind.
    #[error("No more objects")]
    NoMoreObjects,

    /// The priority is already taken by another task.
    #[error("Priority already in use")]
    PrioExist,
    /// The priority is out of range or reserved for a system task.
    #[error("Invalid priority")]
    PrioInvalid,

    /// The task does not exist.
    #[error("Task does not exist")]
    TaskNotExist,
    /// The task is not suspended.
    #[error("Task not suspended")]
    TaskNotSuspended,
    /// The task cannot be suspended.
    #[error("Task cannot be suspended")]
    TaskSuspendInvalid,
    /// Task management was attempted from interrupt context.
    #[error("Task management from ISR")]
    TaskIsr,

    /// The semaphore counter would overflow.
    #[error("Semaphore overflow")]
    SemOvf,
    /// The caller does not own the mutex.
    #[error("Not mutex owner")]
    MutexNotOwner,
    /// The caller already owns the mutex.
    #[error("Already mutex owner")]
    MutexOwner,
    /// The mutex nesting counter would overflow.
    #[error("Mutex nesting overflow")]
    MutexOvf,
    /// The queue is full.
    #[error("Queue full")]
    QFull,
    /// The queue is empty.
    #[error("Queue empty")]
    QEmpty,
    /// The event flag pattern or option is invalid.
    #[error("Invalid flags")]
    FlagInvalid,

    /// The timer is not running.
    #[error("Timer stopped")]
    TmrStopped,
    /// The timer has no valid delay or period configured.
    #[error("Invalid timer delay")]
    TmrInvalidDly,
    /// Timer management was attempted from interrupt context.
    #[error("Timer management from ISR")]
    TmrIsr,

    /// The scheduler lock nesting counter would overflow.
    #[error("Scheduler lock overflow")]
    SchedLockOvf,
    /// The scheduler is not locked.
    #[error("Scheduler not locked")]
    SchedNotLocked,
    /// Scheduler locking was attempted from interrupt context.
    #[error("Scheduler lock from ISR")]
    SchedIsr,
    /// A time delay was attempted from interrupt context.
    #[error("Delay from ISR")]
    TimeDlyIsr,
}

impl ErrorCode {
    /// Returns `true` if the code reports that a pend could not be satisfied, as opposed to a
    /// misuse of the service.
    pub const fn is_pend_outcome(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::PendAbort | Self::PendWouldBlock | Self::ObjDel
        )
    }
}
