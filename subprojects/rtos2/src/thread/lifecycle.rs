//! Exit, terminate, join and detach.

use rtos2_native::{NativeKernel, PendOpt, SemHandle, TaskHandle};

use super::{JoinState, Mode, Teardown, ThreadControl, ThreadState};
use crate::{
    error::{Error, Result},
    kernel::Kernel,
    object::ObjectId,
};

/// Outcome of a successful teardown claim.
struct Claim {
    /// The registry's reference, dropped once no lock is held.
    unlinked: Option<ObjectId>,
    task: Option<TaskHandle>,
    /// Join semaphore to post.
    post: Option<SemHandle>,
}

impl<K: NativeKernel> Kernel<K> {
    /// Body of every native task created by the layer.
    pub(super) fn thread_trampoline(&self, id: ObjectId) {
        let entry = match id.as_thread() {
            Ok(thread) => {
                if let Some(task) = self.inner.native.task_current() {
                    self.bind_task(thread, task);
                }
                thread.inner.lock().state = ThreadState::Running;
                thread.entry.lock().take()
            }
            Err(_) => None,
        };

        if let Some(entry) = entry {
            entry();
        }
        self.exit_current(id)
    }

    /// Terminates the calling thread (`osThreadExit`).
    pub fn thread_exit(&self) -> ! {
        match self.current_thread() {
            Some(id) => self.exit_current(id),
            None => {
                log::error!("thread_exit called outside of a thread");
                self.inner.native.task_del_self()
            }
        }
    }

    /// Tears down the calling thread and deletes its native task.
    pub(super) fn exit_current(&self, id: ObjectId) -> ! {
        if let Ok(thread) = id.as_thread() {
            match self.claim(thread, Teardown::Exited) {
                Ok(claim) => {
                    log::debug!("{id:?} exited");
                    self.publish(&id, thread, claim);
                }
                Err(_) => log::trace!("{id:?} is already torn down"),
            }
        }

        // `id` stays alive until the native task is gone: the thread may be running on a
        // stack that the object owns.
        let _id = id;
        self.inner.native.task_del_self()
    }

    /// Deletes a thread (`osThreadTerminate`).
    ///
    /// Terminating the calling thread does not return. A terminated thread is not given a
    /// chance to clean up: mutexes it owns stay locked and its other resources are lost.
    pub fn thread_terminate(&self, id: &ObjectId) -> Result<()> {
        self.check_isr()?;
        let thread = id.as_thread()?;
        if self.is_current(thread) {
            self.exit_current(id.clone());
        }

        let claim = self.claim(thread, Teardown::Terminated)?;
        let Some(task) = claim.task else {
            return Err(Error::Resource);
        };

        let deleted = self.inner.native.task_del(task);
        if let Err(err) = deleted {
            log::warn!("failed to delete the native task of {id:?}: {err}");
        }
        log::debug!("terminated {id:?}");
        self.publish(id, thread, claim);
        deleted.map_err(|_| Error::Resource)
    }

    /// Waits for a joinable thread to terminate and reclaims it (`osThreadJoin`).
    pub fn thread_join(&self, id: &ObjectId) -> Result<()> {
        self.check_isr()?;
        let thread = id.as_thread()?;
        let me = self.inner.native.task_current();

        let sem = {
            let mut inner = thread.inner.lock();
            if inner.mode != Mode::Joinable || inner.join != JoinState::Idle {
                return Err(Error::Resource);
            }
            if me.is_some() && inner.teardown.is_none() && inner.task == me {
                return Err(Error::Resource);
            }
            let Some(sem) = inner.join_sem else {
                return Err(Error::Resource);
            };
            inner.join = JoinState::Pending;
            sem
        };

        log::trace!("joining {id:?}");
        if let Err(err) = self.inner.native.sem_pend(sem, 0, PendOpt::empty()) {
            log::debug!("join of {id:?} failed: {err}");
            thread.inner.lock().join = JoinState::Idle;
            return Err(Error::Resource);
        }

        let remains = {
            let mut inner = thread.inner.lock();
            inner.join = JoinState::Joined;
            inner.reclaim()
        };
        log::debug!("joined {id:?}");
        self.release_remains(id, remains);
        Ok(())
    }

    /// Makes a joinable thread detached (`osThreadDetach`).
    ///
    /// A thread that already terminated is reclaimed immediately.
    pub fn thread_detach(&self, id: &ObjectId) -> Result<()> {
        self.check_isr()?;
        let thread = id.as_thread()?;

        let (join_sem, remains) = {
            let mut inner = thread.inner.lock();
            if inner.mode != Mode::Joinable || inner.join != JoinState::Idle {
                return Err(Error::Resource);
            }
            inner.mode = Mode::Detached;

            match (inner.teardown.is_some(), inner.released) {
                // Nobody will post the semaphore any more.
                (false, _) => (inner.join_sem.take(), None),
                (true, true) => (None, Some(inner.reclaim())),
                // The teardown is between its claim and its post and reclaims afterwards.
                (true, false) => (None, None),
            }
        };

        log::debug!("detached {id:?}");
        if let Some(sem) = join_sem {
            if let Err(err) = self.inner.native.sem_del(sem) {
                log::warn!("failed to delete the join semaphore of {id:?}: {err}");
            }
        }
        if let Some(remains) = remains {
            self.release_remains(id, remains);
        }
        Ok(())
    }

    /// Claims the teardown of a thread and unlinks it.
    ///
    /// Fails with [`Error::Resource`] if the teardown already ran, or if a termination finds no
    /// native task to delete.
    fn claim(&self, thread: &ThreadControl, how: Teardown) -> Result<Claim> {
        let mut inner = thread.inner.lock();
        if inner.teardown.is_some() {
            return Err(Error::Resource);
        }
        if how == Teardown::Terminated && inner.task.is_none() {
            return Err(Error::Resource);
        }

        inner.teardown = Some(how);
        inner.state = ThreadState::Terminated;
        let unlinked = inner.node.take().and_then(|node| {
            // SAFETY: The node was returned by `insert` and is taken out exactly once.
            unsafe { self.inner.registry.lock().remove(node) }
        });

        Ok(Claim {
            unlinked,
            task: inner.task,
            post: match inner.mode {
                Mode::Joinable => inner.join_sem,
                Mode::Detached => None,
            },
        })
    }

    /// Completes a claimed teardown: wakes the joiner and reclaims a detached thread.
    fn publish(&self, id: &ObjectId, thread: &ThreadControl, claim: Claim) {
        drop(claim.unlinked);

        if let Some(sem) = claim.post {
            if let Err(err) = self.inner.native.sem_post(sem) {
                log::warn!("failed to release the joiner of {id:?}: {err}");
            }
        }

        let remains = {
            let mut inner = thread.inner.lock();
            inner.released = true;
            (inner.mode == Mode::Detached).then(|| inner.reclaim())
        };
        if let Some(remains) = remains {
            self.release_remains(id, remains);
        }
    }
}
