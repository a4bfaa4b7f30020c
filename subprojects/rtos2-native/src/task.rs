//! Native task descriptors.

use alloc::boxed::Box;
use core::ptr::NonNull;

/// Native task priority (`OS_PRIO`). Smaller numbers are more urgent.
pub type NativePrio = u8;

/// The body of a native task.
///
/// The native kernel calls it exactly once on the new task. Returning from it is a contract
/// violation on a real uC/OS kernel; callers are expected to end the body by deleting the task.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Arguments of [`NativeKernel::task_create`].
///
/// [`NativeKernel::task_create`]: crate::NativeKernel::task_create
pub struct TaskSpec<'a> {
    /// Task name, for kernel-aware debuggers.
    pub name: &'a str,
    /// Native priority of the new task.
    pub prio: NativePrio,
    /// Base of the stack memory region.
    pub stack_base: NonNull<u8>,
    /// Size of the stack memory region in bytes.
    pub stack_size: usize,
    /// Task body.
    pub entry: TaskEntry,
}

impl core::fmt::Debug for TaskSpec<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("prio", &self.prio)
            .field("stack_base", &self.stack_base)
            .field("stack_size", &self.stack_size)
            .finish_non_exhaustive()
    }
}

/// Native task state (`OS_TASK_STATE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Ready to run.
    Ready,
    /// Delayed for a number of ticks.
    Delayed,
    /// Pending on an object without timeout.
    Pend,
    /// Pending on an object with a timeout.
    PendTimeout,
    /// Suspended.
    Suspended,
    /// Delayed and suspended.
    DelayedSuspended,
    /// Pending and suspended.
    PendSuspended,
    /// Deleted.
    Deleted,
}

impl TaskState {
    /// Returns `true` if the task is waiting on a delay, an object or a resume.
    pub const fn is_waiting(&self) -> bool {
        !matches!(self, Self::Ready | Self::Deleted)
    }
}
