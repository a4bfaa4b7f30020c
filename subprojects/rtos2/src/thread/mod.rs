//! # Threads
//!
//! A thread is a native task plus the bookkeeping the native kernel does not provide: the
//! abstract priority it was created with, join and detach, and an exactly-once teardown.
//!
//! ## Teardown
//!
//! A thread is torn down either by leaving its entry function (or calling
//! [`Kernel::thread_exit`]) or by [`Kernel::thread_terminate`]. Both paths start by _claiming_
//! the teardown under the thread's lock, so whichever comes second backs off. The claim marks
//! the thread terminated and unlinks it from the registry. The claimant then posts the join
//! semaphore and sets `released`.
//!
//! What remains (join semaphore, stack, control block) is reclaimed exactly once, by whoever
//! sees the last piece of the handoff:
//! - a detached thread is reclaimed by the teardown itself,
//! - a joinable thread by the join that consumed the post,
//! - a joinable thread detached during its teardown by the teardown, once `released` is set,
//! - a joinable thread detached after its teardown by the detach.
//!
//! A thread that exits by itself runs on its stack until the native task is gone, so a
//! layer-allocated stack of such a thread is released with the thread object, never by the
//! reclaim.
//!
//! [`Kernel::thread_exit`]: crate::Kernel::thread_exit
//! [`Kernel::thread_terminate`]: crate::Kernel::thread_terminate

use alloc::boxed::Box;

use rtos2_native::{NativeKernel, NativePrio, SemHandle, TaskHandle};
use spin::Mutex as SpinMutex;

use crate::{
    kernel::Kernel,
    object::ObjectId,
    prio::Priority,
    registry::NodeRef,
    storage::{Backing, StackWord},
};

mod create;
mod info;
mod lifecycle;

pub(crate) type Entry = Box<dyn FnOnce() + Send + 'static>;

/// Thread state (`osThreadState_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ThreadState {
    Inactive = 0,
    Ready = 1,
    Running = 2,
    Blocked = 3,
    Terminated = 4,
    /// Reported for an id that is not a thread.
    Error = -1,
}

/// Whether a thread's remains are reclaimed by a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Joinable,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinState {
    Idle,
    Pending,
    Joined,
}

/// How a thread was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// The thread left by itself.
    Exited,
    /// Another thread deleted it.
    Terminated,
}

pub(crate) struct ThreadControl {
    entry: SpinMutex<Option<Entry>>,
    /// Stack size in bytes.
    stack_size: usize,
    inner: SpinMutex<ThreadInner>,
}

struct ThreadInner {
    task: Option<TaskHandle>,
    priority: Priority,
    native_prio: NativePrio,
    mode: Mode,
    state: ThreadState,
    teardown: Option<Teardown>,
    /// The join semaphore was posted.
    released: bool,
    join: JoinState,
    join_sem: Option<SemHandle>,
    stack: Option<Backing<StackWord>>,
    /// Registry entry, present while the thread is linked.
    node: Option<NodeRef>,
}

/// Resources reclaimed after a teardown.
struct Remains {
    join_sem: Option<SemHandle>,
    stack: Option<Backing<StackWord>>,
}

impl ThreadControl {
    fn new(entry: Entry, stack_size: usize, inner: ThreadInner) -> Self {
        Self {
            entry: SpinMutex::new(Some(entry)),
            stack_size,
            inner: SpinMutex::new(inner),
        }
    }
}

impl ThreadInner {
    fn new(
        priority: Priority,
        mode: Mode,
        join_sem: Option<SemHandle>,
        stack: Backing<StackWord>,
    ) -> Self {
        Self {
            task: None,
            priority,
            native_prio: 0,
            mode,
            state: ThreadState::Ready,
            teardown: None,
            released: false,
            join: JoinState::Idle,
            join_sem,
            stack: Some(stack),
            node: None,
        }
    }

    /// Takes the resources left by the teardown.
    fn reclaim(&mut self) -> Remains {
        Remains {
            join_sem: self.join_sem.take(),
            stack: match self.teardown {
                Some(Teardown::Terminated) => self.stack.take(),
                _ => None,
            },
        }
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Resolves the calling native task to its thread.
    pub(crate) fn current_thread(&self) -> Option<ObjectId> {
        let task = self.inner.native.task_current()?;
        self.inner.registry.lock().find_by_native_handle(task)
    }

    /// Returns `true` if `thread` is the calling thread.
    ///
    /// A torn-down thread is never current: its native handle may already name another task.
    fn is_current(&self, thread: &ThreadControl) -> bool {
        let me = self.inner.native.task_current();
        let inner = thread.inner.lock();
        me.is_some() && inner.teardown.is_none() && inner.task == me
    }

    /// Gives reclaimed resources back.
    fn release_remains(&self, id: &ObjectId, remains: Remains) {
        if let Some(sem) = remains.join_sem {
            if let Err(err) = self.inner.native.sem_del(sem) {
                log::warn!("failed to delete the join semaphore of {id:?}: {err}");
            }
        }
        if let Some(stack) = remains.stack {
            stack.release();
        }
        id.release_cb();
        log::trace!("released the resources of {id:?}");
    }
}
