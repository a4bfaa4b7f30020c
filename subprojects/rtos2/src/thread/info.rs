//! Thread inspection, priority and scheduling control.

use alloc::vec::Vec;

use rtos2_native::{NativeKernel, NativePrio, TaskHandle, TaskState};

use super::ThreadState;
use crate::{
    error::{Error, Result},
    kernel::Kernel,
    object::{ObjectId, ObjectKind},
    prio::Priority,
};

impl<K: NativeKernel> Kernel<K> {
    /// Returns the name of a thread (`osThreadGetName`).
    pub fn thread_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::Thread)
    }

    /// Returns the calling thread (`osThreadGetId`). `None` before the kernel runs and outside
    /// of threads created by the layer.
    pub fn thread_current(&self) -> Option<ObjectId> {
        if !self.inner.native.is_running() {
            return None;
        }
        self.current_thread()
    }

    /// Returns the state of a thread (`osThreadGetState`).
    pub fn thread_state(&self, id: &ObjectId) -> ThreadState {
        let Ok(thread) = id.as_thread() else {
            return ThreadState::Error;
        };

        let (state, task) = {
            let inner = thread.inner.lock();
            (inner.state, inner.task)
        };
        if state == ThreadState::Terminated {
            return ThreadState::Terminated;
        }
        let Some(task) = task else {
            return state;
        };
        if self.inner.native.task_current() == Some(task) {
            return ThreadState::Running;
        }

        match self.inner.native.task_state(task) {
            Ok(TaskState::Ready) => ThreadState::Ready,
            Ok(TaskState::Deleted) | Err(_) => ThreadState::Terminated,
            Ok(_) => ThreadState::Blocked,
        }
    }

    /// Returns the priority a thread was created with or last set to (`osThreadGetPriority`).
    pub fn thread_priority(&self, id: &ObjectId) -> Option<Priority> {
        let thread = id.as_thread().ok()?;
        Some(thread.inner.lock().priority)
    }

    /// Returns the native priority of a thread.
    pub fn thread_native_priority(&self, id: &ObjectId) -> Option<NativePrio> {
        let thread = id.as_thread().ok()?;
        Some(thread.inner.lock().native_prio)
    }

    /// Changes the priority of a thread (`osThreadSetPriority`).
    ///
    /// The new native priority is allocated the same way as at creation, ignoring the slot the
    /// thread holds itself.
    pub fn thread_set_priority(&self, id: &ObjectId, priority: Priority) -> Result<()> {
        let thread = id.as_thread()?;
        self.check_isr()?;

        let native = &self.inner.native;
        let (task, previous, native_prio) = {
            let mut inner = thread.inner.lock();
            let (Some(task), Some(node), None) = (inner.task, inner.node, inner.teardown) else {
                return Err(Error::Resource);
            };

            let mut registry = self.inner.registry.lock();
            let own = inner.native_prio;
            let native_prio = self
                .inner
                .band
                .allocate(priority, |p| {
                    p != own && (registry.prio_taken(p, Some(node)) || native.prio_in_use(p))
                })
                .ok_or(Error::Resource)?;

            // SAFETY: `node` is present, so it is linked in this kernel's registry.
            unsafe { registry.set_prio(node, native_prio) };
            let previous = (inner.priority, inner.native_prio);
            inner.priority = priority;
            inner.native_prio = native_prio;
            (task, previous, native_prio)
        };

        if let Err(err) = native.task_change_prio(task, native_prio) {
            log::debug!("failed to move {id:?} to native priority {native_prio}: {err}");
            let mut inner = thread.inner.lock();
            if inner.native_prio == native_prio {
                inner.priority = previous.0;
                inner.native_prio = previous.1;
                if let Some(node) = inner.node {
                    // SAFETY: See above.
                    unsafe { self.inner.registry.lock().set_prio(node, previous.1) };
                }
            }
            return Err(Error::Resource);
        }

        log::trace!("{id:?} now runs at {priority:?} (native {native_prio})");
        Ok(())
    }

    /// Yields to other ready threads of the same priority (`osThreadYield`).
    pub fn thread_yield(&self) -> Result<()> {
        self.check_running()?;
        self.inner
            .native
            .task_yield()
            .map_err(|_| Error::Unknown)
    }

    /// Suspends a thread (`osThreadSuspend`).
    pub fn thread_suspend(&self, id: &ObjectId) -> Result<()> {
        self.check_isr()?;
        let task = self.live_task(id)?;
        self.inner.native.task_suspend(task).map_err(|err| {
            log::debug!("failed to suspend {id:?}: {err}");
            Error::Resource
        })
    }

    /// Resumes a suspended thread (`osThreadResume`).
    pub fn thread_resume(&self, id: &ObjectId) -> Result<()> {
        self.check_isr()?;
        let task = self.live_task(id)?;
        self.inner.native.task_resume(task).map_err(|err| {
            log::debug!("failed to resume {id:?}: {err}");
            Error::Resource
        })
    }

    /// Returns the number of live threads (`osThreadGetCount`).
    pub fn thread_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Returns the live threads in creation order (`osThreadEnumerate`).
    pub fn thread_enumerate(&self) -> Vec<ObjectId> {
        self.inner.registry.lock().iter().cloned().collect()
    }

    /// Returns the stack size of a thread in bytes, or 0 if `id` is not a thread
    /// (`osThreadGetStackSize`).
    pub fn thread_stack_size(&self, id: &ObjectId) -> usize {
        id.as_thread().map_or(0, |thread| thread.stack_size)
    }

    /// Returns the native task of a thread that has not been torn down.
    fn live_task(&self, id: &ObjectId) -> Result<TaskHandle> {
        let inner = id.as_thread()?.inner.lock();
        match (inner.teardown, inner.task) {
            (None, Some(task)) => Ok(task),
            _ => Err(Error::Parameter),
        }
    }
}
