//! Task hosting: spawning, deletion points and blocking.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::MutexGuard,
    thread,
    time::Instant,
};

use rtos2_native::{ErrorCode, PendOpt, Result, TaskEntry, TaskHandle, TaskSpec, Tick};

use crate::{
    SimKernel,
    context::{self, TaskRef},
    world::{Tcb, Wait, World},
};

/// Minimum host stack for a task thread. Native stack sizes are far too small for host code.
const MIN_HOST_STACK: usize = 256 * 1024;

/// Unwind payload that ends a deleted task.
pub(crate) struct TaskDeleted;

/// How the calling host thread relates to the kernel.
enum Presence {
    /// Not a task of this kernel.
    Foreign,
    Runnable,
    Suspended,
    Deleted,
}

impl SimKernel {
    /// Returns the task bound to the calling host thread, if it belongs to this kernel.
    pub(crate) fn me(&self) -> Option<TaskRef> {
        context::current_task().filter(|task| task.kernel == self.id())
    }

    fn presence(&self, world: &World) -> Presence {
        let Some(me) = self.me() else {
            return Presence::Foreign;
        };

        match world.tasks.get(me.key) {
            Some(tcb) if tcb.serial == me.serial => {
                if tcb.suspend_ctr > 0 {
                    Presence::Suspended
                } else {
                    Presence::Runnable
                }
            }
            _ => Presence::Deleted,
        }
    }

    /// A deletion point.
    ///
    /// Ends the calling task if it was deleted and parks it while it is suspended.
    pub(crate) fn checkpoint<'a>(
        &'a self,
        mut world: MutexGuard<'a, World>,
    ) -> MutexGuard<'a, World> {
        loop {
            match self.presence(&world) {
                Presence::Foreign | Presence::Runnable => return world,
                Presence::Suspended => world = self.wait(world),
                Presence::Deleted => {
                    drop(world);
                    panic::resume_unwind(Box::new(TaskDeleted));
                }
            }
        }
    }

    pub(crate) fn set_wait(&self, world: &mut World, wait: Wait) {
        if let Some(me) = self.me() {
            if let Some(tcb) = world.tasks.get_mut(me.key) {
                if tcb.serial == me.serial {
                    tcb.wait = wait;
                }
            }
        }
    }

    /// Runs a pend.
    ///
    /// `poll` is called with the kernel locked; it returns `None` while the object is
    /// unavailable.
    pub(crate) fn pend<'a, T>(
        &'a self,
        mut world: MutexGuard<'a, World>,
        timeout: Tick,
        opt: PendOpt,
        mut poll: impl FnMut(&mut World) -> Option<Result<T>>,
    ) -> Result<T> {
        if opt.is_blocking() {
            if context::in_isr() {
                return Err(ErrorCode::PendIsr);
            }
            world = self.checkpoint(world);
        }

        if let Some(result) = poll(&mut *world) {
            return result;
        }

        if !opt.is_blocking() {
            return Err(ErrorCode::PendWouldBlock);
        }

        if world.sched_lock > 0 && self.me().is_some() {
            return Err(ErrorCode::PendLocked);
        }

        let deadline = (timeout != 0).then(|| Instant::now() + self.ticks_to_duration(timeout));
        let wait = match deadline {
            Some(_) => Wait::PendTimeout,
            None => Wait::Pend,
        };
        self.set_wait(&mut *world, wait);

        let result = loop {
            world = match deadline {
                None => self.wait(world),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(ErrorCode::Timeout);
                    }
                    self.wait_timeout(world, deadline - now)
                }
            };

            world = self.checkpoint(world);
            if let Some(result) = poll(&mut *world) {
                break result;
            }
        };

        self.set_wait(&mut *world, Wait::None);
        result
    }

    /// Blocks the calling task for `ticks`.
    pub(crate) fn delay<'a>(&'a self, mut world: MutexGuard<'a, World>, ticks: Tick) {
        let deadline = Instant::now() + self.ticks_to_duration(ticks);
        self.set_wait(&mut *world, Wait::Delay);

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            world = self.wait_timeout(world, deadline - now);
            world = self.checkpoint(world);
        }

        self.set_wait(&mut *world, Wait::None);
    }

    /// Creates the control block and the host thread of a task.
    pub(crate) fn spawn(&self, world: &mut World, spec: TaskSpec<'_>) -> Result<TaskHandle> {
        let serial = world.next_serial();
        let key = world.tasks.insert(Tcb {
            name: spec.name.to_owned(),
            prio: spec.prio,
            serial,
            thread: None,
            suspend_ctr: 0,
            wait: Wait::None,
        });
        let task = TaskRef {
            kernel: self.id(),
            key,
            serial,
        };

        let kernel = self.clone();
        let entry = spec.entry;
        let spawned = thread::Builder::new()
            .name(spec.name.to_owned())
            .stack_size(spec.stack_size.max(MIN_HOST_STACK))
            .spawn(move || kernel.task_root(task, entry));

        match spawned {
            Ok(join_handle) => {
                world.tasks[key].thread = Some(join_handle.thread().id());
                log::trace!(
                    "spawned task {:?} (prio {}, slot {key})",
                    spec.name,
                    spec.prio
                );
                // SAFETY: `key` is the slot of the control block that was just inserted.
                Ok(unsafe { TaskHandle::from_raw(key as u32) })
            }
            Err(err) => {
                log::warn!("failed to spawn a host thread for {:?}: {err}", spec.name);
                world.tasks.remove(key);
                Err(ErrorCode::NoMoreObjects)
            }
        }
    }

    /// Body of every task host thread.
    fn task_root(self, task: TaskRef, entry: TaskEntry) {
        context::set_current_task(Some(task));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.await_start();
            entry();
        }));

        match outcome {
            Ok(()) => {
                log::warn!("task in slot {} returned without deleting itself", task.key);
                self.remove_task(task);
            }
            Err(payload) if payload.is::<TaskDeleted>() => {}
            Err(payload) => {
                log::error!(
                    "task in slot {} panicked: {}",
                    task.key,
                    panic_message(&*payload)
                );
                self.remove_task(task);
            }
        }

        context::set_current_task(None);
    }

    /// Parks a freshly created task until the kernel runs.
    fn await_start(&self) {
        let mut world = self.checkpoint(self.lock());
        while !world.running {
            world = self.checkpoint(self.wait(world));
        }
    }

    pub(crate) fn remove_task(&self, task: TaskRef) {
        let mut world = self.lock();
        if world
            .tasks
            .get(task.key)
            .is_some_and(|tcb| tcb.serial == task.serial)
        {
            let tcb = world.tasks.remove(task.key);
            log::trace!("removed task {:?} from slot {}", tcb.name, task.key);
        }
        drop(world);
        self.notify();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string payload>"
    }
}
