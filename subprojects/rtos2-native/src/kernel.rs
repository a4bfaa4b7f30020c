//! The native kernel capability trait.

use crate::{
    Tick,
    error::Result,
    handle::{FlagGrpHandle, MutexHandle, QueueHandle, SemHandle, TaskHandle, TmrHandle},
    opt::{FlagPostOpt, PendOpt},
    task::{NativePrio, TaskSpec, TaskState},
    tmr::{TmrCallback, TmrState},
};

/// The services of a uC/OS-style kernel.
///
/// Every method maps onto one native service (`OSSemPend`, `OSTaskDel`, ...). Implementations
/// must be callable from any task and, where the native service allows it, from interrupt
/// context.
///
/// # Timeouts
///
/// Pend services take a `timeout` in ticks and a set of [`PendOpt`] options:
/// - `timeout == 0` without [`PendOpt::NON_BLOCKING`] waits forever.
/// - With [`PendOpt::NON_BLOCKING`] the timeout is ignored and an unavailable object reports
///   [`ErrorCode::PendWouldBlock`].
///
/// A blocking pend from interrupt context reports [`ErrorCode::PendIsr`].
///
/// [`ErrorCode::PendWouldBlock`]: crate::ErrorCode::PendWouldBlock
/// [`ErrorCode::PendIsr`]: crate::ErrorCode::PendIsr
pub trait NativeKernel: Send + Sync + 'static {
    /// Initializes the kernel (`OSInit`).
    fn init(&self) -> Result<()>;

    /// Starts multitasking (`OSStart`).
    fn start(&self) -> Result<()>;

    /// Returns `true` once multitasking has started (`OSRunning`).
    fn is_running(&self) -> bool;

    /// Returns `true` if the caller runs in interrupt context (`OSIntNestingCtr > 0`).
    fn in_isr(&self) -> bool;

    /// Returns the native kernel version (`OS_VERSION`).
    fn version(&self) -> u32;

    /// Returns the numerically largest valid priority (`OS_CFG_PRIO_MAX - 1`,
    /// `OS_LOWEST_PRIO`). It belongs to the idle task.
    fn lowest_prio(&self) -> NativePrio;

    /// Returns the tick rate in Hz (`OS_CFG_TICK_RATE_HZ`).
    fn tick_rate_hz(&self) -> u32;

    /// Returns the current tick count (`OSTimeGet`).
    fn time_get(&self) -> Tick;

    /// Delays the calling task (`OSTimeDly`). A zero delay yields.
    fn time_dly(&self, ticks: Tick) -> Result<()>;

    /// Locks the scheduler (`OSSchedLock`).
    fn sched_lock(&self) -> Result<()>;

    /// Unlocks the scheduler (`OSSchedUnlock`).
    fn sched_unlock(&self) -> Result<()>;

    /// Returns the scheduler lock nesting counter (`OSSchedLockNestingCtr`).
    fn sched_lock_nesting(&self) -> u8;

    /// Creates and readies a task (`OSTaskCreate`).
    ///
    /// The new task may start running before this method returns.
    fn task_create(&self, spec: TaskSpec<'_>) -> Result<TaskHandle>;

    /// Deletes a task other than the caller (`OSTaskDel(p_tcb)`).
    fn task_del(&self, task: TaskHandle) -> Result<()>;

    /// Deletes the calling task (`OSTaskDel(NULL)`).
    fn task_del_self(&self) -> !;

    /// Returns the running task (`OSTCBCurPtr`), or `None` outside of a task.
    fn task_current(&self) -> Option<TaskHandle>;

    /// Returns the state of a task (`p_tcb->TaskState`).
    fn task_state(&self, task: TaskHandle) -> Result<TaskState>;

    /// Changes the priority of a task (`OSTaskChangePrio`).
    fn task_change_prio(&self, task: TaskHandle, prio: NativePrio) -> Result<()>;

    /// Suspends a task (`OSTaskSuspend`). Suspending the caller blocks it until resumed.
    fn task_suspend(&self, task: TaskHandle) -> Result<()>;

    /// Resumes a suspended task (`OSTaskResume`).
    fn task_resume(&self, task: TaskHandle) -> Result<()>;

    /// Yields the processor to tasks of the same priority (`OSSched` / round robin).
    fn task_yield(&self) -> Result<()>;

    /// Returns `true` if the priority is held by a task, including system tasks.
    fn prio_in_use(&self, prio: NativePrio) -> bool;

    /// Creates a counting semaphore (`OSSemCreate`).
    fn sem_create(&self, name: &str, count: u32) -> Result<SemHandle>;

    /// Pends on a semaphore (`OSSemPend`). Returns the counter after the pend.
    fn sem_pend(&self, sem: SemHandle, timeout: Tick, opt: PendOpt) -> Result<u32>;

    /// Posts a semaphore (`OSSemPost`). Returns the counter after the post.
    fn sem_post(&self, sem: SemHandle) -> Result<u32>;

    /// Returns the semaphore counter.
    fn sem_count(&self, sem: SemHandle) -> Result<u32>;

    /// Sets the semaphore counter (`OSSemSet`).
    fn sem_set(&self, sem: SemHandle, count: u32) -> Result<()>;

    /// Deletes a semaphore, readying all waiters with [`ErrorCode::ObjDel`].
    ///
    /// [`ErrorCode::ObjDel`]: crate::ErrorCode::ObjDel
    fn sem_del(&self, sem: SemHandle) -> Result<()>;

    /// Creates a mutual exclusion semaphore (`OSMutexCreate`).
    fn mutex_create(&self, name: &str) -> Result<MutexHandle>;

    /// Acquires a mutex (`OSMutexPend`).
    fn mutex_pend(&self, mutex: MutexHandle, timeout: Tick, opt: PendOpt) -> Result<()>;

    /// Releases a mutex owned by the caller (`OSMutexPost`).
    fn mutex_post(&self, mutex: MutexHandle) -> Result<()>;

    /// Returns the owning task, if any (`p_mutex->OwnerTCBPtr`).
    fn mutex_owner(&self, mutex: MutexHandle) -> Result<Option<TaskHandle>>;

    /// Deletes a mutex (`OSMutexDel`).
    fn mutex_del(&self, mutex: MutexHandle) -> Result<()>;

    /// Creates an event flag group (`OSFlagCreate`).
    fn flag_create(&self, name: &str, flags: u32) -> Result<FlagGrpHandle>;

    /// Pends on an event flag group (`OSFlagPend`). Returns the flags that made the task ready.
    fn flag_pend(&self, grp: FlagGrpHandle, flags: u32, timeout: Tick, opt: PendOpt)
    -> Result<u32>;

    /// Sets or clears flags (`OSFlagPost`). Returns the flags after the post.
    fn flag_post(&self, grp: FlagGrpHandle, flags: u32, opt: FlagPostOpt) -> Result<u32>;

    /// Returns the current flags (`OSFlagQuery`).
    fn flag_query(&self, grp: FlagGrpHandle) -> Result<u32>;

    /// Deletes an event flag group (`OSFlagDel`).
    fn flag_del(&self, grp: FlagGrpHandle) -> Result<()>;

    /// Creates a message queue of `depth` entries (`OSQCreate`).
    fn q_create(&self, name: &str, depth: u32) -> Result<QueueHandle>;

    /// Posts a message at the back of the queue (`OSQPost`, FIFO).
    fn q_post(&self, queue: QueueHandle, msg: usize) -> Result<()>;

    /// Pends on a queue (`OSQPend`). Returns the message at the front.
    fn q_pend(&self, queue: QueueHandle, timeout: Tick, opt: PendOpt) -> Result<usize>;

    /// Returns the number of queued messages.
    fn q_count(&self, queue: QueueHandle) -> Result<u32>;

    /// Discards all queued messages (`OSQFlush`). Returns how many were discarded.
    fn q_flush(&self, queue: QueueHandle) -> Result<u32>;

    /// Deletes a queue (`OSQDel`).
    fn q_del(&self, queue: QueueHandle) -> Result<()>;

    /// Creates a stopped software timer (`OSTmrCreate`).
    fn tmr_create(&self, name: &str, callback: TmrCallback) -> Result<TmrHandle>;

    /// Configures the first expiry and the reload period (`OSTmrSet`). A zero period makes a
    /// one-shot timer.
    fn tmr_set(&self, tmr: TmrHandle, dly: Tick, period: Tick) -> Result<()>;

    /// Starts or restarts the timer (`OSTmrStart`).
    fn tmr_start(&self, tmr: TmrHandle) -> Result<()>;

    /// Stops the timer (`OSTmrStop`).
    fn tmr_stop(&self, tmr: TmrHandle) -> Result<()>;

    /// Returns the timer state (`OSTmrStateGet`).
    fn tmr_state(&self, tmr: TmrHandle) -> Result<TmrState>;

    /// Deletes the timer (`OSTmrDel`).
    fn tmr_del(&self, tmr: TmrHandle) -> Result<()>;
}
