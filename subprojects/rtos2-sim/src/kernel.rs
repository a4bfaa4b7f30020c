//! [`NativeKernel`] services of the simulated kernel.

use std::{collections::VecDeque, thread, time::Instant};

use rtos2_native::{
    ErrorCode, FlagGrpHandle, FlagPostOpt, MutexHandle, NativeKernel, NativePrio, PendOpt,
    QueueHandle, Result, SemHandle, TaskHandle, TaskSpec, TaskState, Tick, TmrCallback, TmrHandle,
    TmrState, handle::RawHandle,
};

use crate::{
    SimKernel,
    context::{self, TaskRef},
    task::TaskDeleted,
    world::{FlagGrpCb, MutexCb, Owner, QueueCb, SemCb, TmrCb, World, slot},
};

/// Largest scheduler lock nesting (`OSSchedLockNestingCtr` is a `u8`).
const SCHED_LOCK_MAX: u8 = 250;

/// Generates a `from_raw` conversion for a freshly inserted slab slot.
macro_rules! handle {
    ($ty:ty, $key:expr) => {
        // SAFETY: `$key` is the slot of a control block of the matching table.
        unsafe { <$ty>::from_raw($key as RawHandle) }
    };
}

impl SimKernel {
    fn check_prio(&self, world: &World, prio: NativePrio, exclude: Option<usize>) -> Result<()> {
        let config = self.config();
        if prio > config.lowest_prio || prio >= config.first_reserved_prio() {
            return Err(ErrorCode::PrioInvalid);
        }

        if config.unique_prios
            && world
                .tasks
                .iter()
                .any(|(key, tcb)| tcb.prio == prio && Some(key) != exclude)
        {
            return Err(ErrorCode::PrioExist);
        }

        Ok(())
    }

    fn owner(&self) -> Owner {
        Owner {
            thread: thread::current().id(),
            task: self.me().map(|task| task.key),
        }
    }

    fn is_me(&self, task: TaskHandle) -> bool {
        self.me()
            .is_some_and(|me| me.key == slot(task.to_raw()))
    }
}

impl NativeKernel for SimKernel {
    fn init(&self) -> Result<()> {
        let mut world = self.lock();
        if world.running {
            return Err(ErrorCode::OsRunning);
        }
        world.initialized = true;
        log::debug!("kernel initialized");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut world = self.lock();
        if !world.initialized {
            return Err(ErrorCode::OsNotInit);
        }
        if world.running {
            return Err(ErrorCode::OsRunning);
        }
        world.running = true;
        drop(world);

        self.spawn_timer_service();
        self.notify();
        log::debug!("kernel started");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }

    fn in_isr(&self) -> bool {
        context::in_isr()
    }

    fn version(&self) -> u32 {
        self.config().version
    }

    fn lowest_prio(&self) -> NativePrio {
        self.config().lowest_prio
    }

    fn tick_rate_hz(&self) -> u32 {
        self.config().tick_rate_hz
    }

    fn time_get(&self) -> Tick {
        let hz = u128::from(self.config().tick_rate_hz);
        (self.shared.origin.elapsed().as_micros() * hz / 1_000_000) as Tick
    }

    fn time_dly(&self, ticks: Tick) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TimeDlyIsr);
        }

        let world = self.lock();
        if !world.running {
            return Err(ErrorCode::OsNotRunning);
        }
        if world.sched_lock > 0 && self.me().is_some() {
            return Err(ErrorCode::PendLocked);
        }

        let world = self.checkpoint(world);
        if ticks == 0 {
            drop(world);
            thread::yield_now();
        } else {
            self.delay(world, ticks);
        }
        Ok(())
    }

    fn sched_lock(&self) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::SchedIsr);
        }

        let mut world = self.lock();
        if !world.running {
            return Err(ErrorCode::OsNotRunning);
        }
        if world.sched_lock >= SCHED_LOCK_MAX {
            return Err(ErrorCode::SchedLockOvf);
        }
        world.sched_lock += 1;
        Ok(())
    }

    fn sched_unlock(&self) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::SchedIsr);
        }

        let mut world = self.lock();
        if !world.running {
            return Err(ErrorCode::OsNotRunning);
        }
        if world.sched_lock == 0 {
            return Err(ErrorCode::SchedNotLocked);
        }
        world.sched_lock -= 1;
        drop(world);
        self.notify();
        Ok(())
    }

    fn sched_lock_nesting(&self) -> u8 {
        self.lock().sched_lock
    }

    fn task_create(&self, spec: TaskSpec<'_>) -> Result<TaskHandle> {
        if context::in_isr() {
            return Err(ErrorCode::TaskIsr);
        }

        let mut world = self.lock();
        if !world.initialized {
            return Err(ErrorCode::OsNotInit);
        }
        self.check_prio(&world, spec.prio, None)?;
        self.spawn(&mut world, spec)
    }

    fn task_del(&self, task: TaskHandle) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TaskIsr);
        }
        if self.is_me(task) {
            self.task_del_self();
        }

        let mut world = self.lock();
        let key = slot(task.to_raw());
        if !world.tasks.contains(key) {
            return Err(ErrorCode::TaskNotExist);
        }
        let tcb = world.tasks.remove(key);
        drop(world);

        log::trace!("deleted task {:?} (host thread {:?})", tcb.name, tcb.thread);
        self.notify();
        Ok(())
    }

    fn task_del_self(&self) -> ! {
        let Some(me) = self.me() else {
            panic!("task_del_self called outside of a task");
        };

        self.remove_task(me);
        std::panic::resume_unwind(Box::new(TaskDeleted));
    }

    fn task_current(&self) -> Option<TaskHandle> {
        self.me().map(|TaskRef { key, .. }| handle!(TaskHandle, key))
    }

    fn task_state(&self, task: TaskHandle) -> Result<TaskState> {
        Ok(self.lock().task(task)?.state())
    }

    fn task_change_prio(&self, task: TaskHandle, prio: NativePrio) -> Result<()> {
        let mut world = self.lock();
        world.task(task)?;
        self.check_prio(&world, prio, Some(slot(task.to_raw())))?;
        world.task(task)?.prio = prio;
        Ok(())
    }

    fn task_suspend(&self, task: TaskHandle) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TaskIsr);
        }

        let mut world = self.lock();
        let is_me = self.is_me(task);
        if is_me && world.sched_lock > 0 {
            return Err(ErrorCode::PendLocked);
        }

        let tcb = world.task(task)?;
        tcb.suspend_ctr = tcb
            .suspend_ctr
            .checked_add(1)
            .ok_or(ErrorCode::TaskSuspendInvalid)?;

        if is_me {
            drop(self.checkpoint(world));
        }
        Ok(())
    }

    fn task_resume(&self, task: TaskHandle) -> Result<()> {
        let mut world = self.lock();
        let tcb = world.task(task)?;
        if tcb.suspend_ctr == 0 {
            return Err(ErrorCode::TaskNotSuspended);
        }
        tcb.suspend_ctr -= 1;
        drop(world);
        self.notify();
        Ok(())
    }

    fn task_yield(&self) -> Result<()> {
        let world = self.lock();
        if !world.running {
            return Err(ErrorCode::OsNotRunning);
        }
        drop(self.checkpoint(world));
        thread::yield_now();
        Ok(())
    }

    fn prio_in_use(&self, prio: NativePrio) -> bool {
        let world = self.lock();
        prio >= self.config().first_reserved_prio()
            || world.tasks.iter().any(|(_, tcb)| tcb.prio == prio)
    }

    fn sem_create(&self, name: &str, count: u32) -> Result<SemHandle> {
        let mut world = self.lock();
        let serial = world.next_serial();
        let key = world.sems.insert(SemCb {
            name: name.to_owned(),
            serial,
            count,
        });
        Ok(handle!(SemHandle, key))
    }

    fn sem_pend(&self, sem: SemHandle, timeout: Tick, opt: PendOpt) -> Result<u32> {
        let mut world = self.lock();
        let serial = world.sem(sem)?.serial;
        self.pend(world, timeout, opt, |world| match world.sem(sem) {
            Ok(cb) if cb.serial == serial => (cb.count > 0).then(|| {
                cb.count -= 1;
                Ok(cb.count)
            }),
            _ => Some(Err(ErrorCode::ObjDel)),
        })
    }

    fn sem_post(&self, sem: SemHandle) -> Result<u32> {
        let mut world = self.lock();
        let cb = world.sem(sem)?;
        cb.count = cb.count.checked_add(1).ok_or(ErrorCode::SemOvf)?;
        let count = cb.count;
        drop(world);
        self.notify();
        Ok(count)
    }

    fn sem_count(&self, sem: SemHandle) -> Result<u32> {
        Ok(self.lock().sem(sem)?.count)
    }

    fn sem_set(&self, sem: SemHandle, count: u32) -> Result<()> {
        let mut world = self.lock();
        world.sem(sem)?.count = count;
        drop(world);
        self.notify();
        Ok(())
    }

    fn sem_del(&self, sem: SemHandle) -> Result<()> {
        let mut world = self.lock();
        world.sem(sem)?;
        let cb = world.sems.remove(slot(sem.to_raw()));
        drop(world);
        log::trace!("deleted semaphore {:?}", cb.name);
        self.notify();
        Ok(())
    }

    fn mutex_create(&self, name: &str) -> Result<MutexHandle> {
        let mut world = self.lock();
        let serial = world.next_serial();
        let key = world.mutexes.insert(MutexCb {
            name: name.to_owned(),
            serial,
            owner: None,
        });
        Ok(handle!(MutexHandle, key))
    }

    fn mutex_pend(&self, mutex: MutexHandle, timeout: Tick, opt: PendOpt) -> Result<()> {
        let me = self.owner();
        let mut world = self.lock();
        let serial = world.mutex(mutex)?.serial;
        self.pend(world, timeout, opt, |world| match world.mutex(mutex) {
            Ok(cb) if cb.serial == serial => match cb.owner {
                None => {
                    cb.owner = Some(me);
                    Some(Ok(()))
                }
                Some(owner) if owner.thread == me.thread => Some(Err(ErrorCode::MutexOwner)),
                Some(_) => None,
            },
            _ => Some(Err(ErrorCode::ObjDel)),
        })
    }

    fn mutex_post(&self, mutex: MutexHandle) -> Result<()> {
        let me = self.owner();
        let mut world = self.lock();
        let cb = world.mutex(mutex)?;
        if cb.owner.map(|owner| owner.thread) != Some(me.thread) {
            return Err(ErrorCode::MutexNotOwner);
        }
        cb.owner = None;
        drop(world);
        self.notify();
        Ok(())
    }

    fn mutex_owner(&self, mutex: MutexHandle) -> Result<Option<TaskHandle>> {
        let mut world = self.lock();
        let owner = world.mutex(mutex)?.owner;
        Ok(owner
            .and_then(|owner| owner.task)
            .map(|key| handle!(TaskHandle, key)))
    }

    fn mutex_del(&self, mutex: MutexHandle) -> Result<()> {
        let mut world = self.lock();
        world.mutex(mutex)?;
        let cb = world.mutexes.remove(slot(mutex.to_raw()));
        drop(world);
        log::trace!("deleted mutex {:?}", cb.name);
        self.notify();
        Ok(())
    }

    fn flag_create(&self, name: &str, flags: u32) -> Result<FlagGrpHandle> {
        let mut world = self.lock();
        let serial = world.next_serial();
        let key = world.flag_grps.insert(FlagGrpCb {
            name: name.to_owned(),
            serial,
            flags,
        });
        Ok(handle!(FlagGrpHandle, key))
    }

    fn flag_pend(
        &self,
        grp: FlagGrpHandle,
        flags: u32,
        timeout: Tick,
        opt: PendOpt,
    ) -> Result<u32> {
        let all = opt.contains(PendOpt::FLAG_SET_ALL);
        let any = opt.contains(PendOpt::FLAG_SET_ANY);
        if all == any || flags == 0 {
            return Err(ErrorCode::FlagInvalid);
        }
        let consume = opt.contains(PendOpt::FLAG_CONSUME);

        let mut world = self.lock();
        let serial = world.flag_grp(grp)?.serial;
        self.pend(world, timeout, opt, |world| match world.flag_grp(grp) {
            Ok(cb) if cb.serial == serial => {
                let matched = cb.flags & flags;
                let ready = if all { matched == flags } else { matched != 0 };
                ready.then(|| {
                    if consume {
                        cb.flags &= !matched;
                    }
                    Ok(matched)
                })
            }
            _ => Some(Err(ErrorCode::ObjDel)),
        })
    }

    fn flag_post(&self, grp: FlagGrpHandle, flags: u32, opt: FlagPostOpt) -> Result<u32> {
        let mut world = self.lock();
        let cb = world.flag_grp(grp)?;
        match opt {
            FlagPostOpt::Set => cb.flags |= flags,
            FlagPostOpt::Clear => cb.flags &= !flags,
        }
        let current = cb.flags;
        drop(world);
        self.notify();
        Ok(current)
    }

    fn flag_query(&self, grp: FlagGrpHandle) -> Result<u32> {
        Ok(self.lock().flag_grp(grp)?.flags)
    }

    fn flag_del(&self, grp: FlagGrpHandle) -> Result<()> {
        let mut world = self.lock();
        world.flag_grp(grp)?;
        let cb = world.flag_grps.remove(slot(grp.to_raw()));
        drop(world);
        log::trace!("deleted event flag group {:?}", cb.name);
        self.notify();
        Ok(())
    }

    fn q_create(&self, name: &str, depth: u32) -> Result<QueueHandle> {
        if depth == 0 {
            return Err(ErrorCode::OptInvalid);
        }

        let mut world = self.lock();
        let serial = world.next_serial();
        let key = world.queues.insert(QueueCb {
            name: name.to_owned(),
            serial,
            depth: depth as usize,
            msgs: VecDeque::with_capacity(depth as usize),
        });
        Ok(handle!(QueueHandle, key))
    }

    fn q_post(&self, queue: QueueHandle, msg: usize) -> Result<()> {
        let mut world = self.lock();
        let cb = world.queue(queue)?;
        if cb.msgs.len() >= cb.depth {
            return Err(ErrorCode::QFull);
        }
        cb.msgs.push_back(msg);
        drop(world);
        self.notify();
        Ok(())
    }

    fn q_pend(&self, queue: QueueHandle, timeout: Tick, opt: PendOpt) -> Result<usize> {
        let mut world = self.lock();
        let serial = world.queue(queue)?.serial;
        self.pend(world, timeout, opt, |world| match world.queue(queue) {
            Ok(cb) if cb.serial == serial => cb.msgs.pop_front().map(Ok),
            _ => Some(Err(ErrorCode::ObjDel)),
        })
    }

    fn q_count(&self, queue: QueueHandle) -> Result<u32> {
        Ok(self.lock().queue(queue)?.msgs.len() as u32)
    }

    fn q_flush(&self, queue: QueueHandle) -> Result<u32> {
        let mut world = self.lock();
        let cb = world.queue(queue)?;
        let flushed = cb.msgs.len() as u32;
        cb.msgs.clear();
        Ok(flushed)
    }

    fn q_del(&self, queue: QueueHandle) -> Result<()> {
        let mut world = self.lock();
        world.queue(queue)?;
        let cb = world.queues.remove(slot(queue.to_raw()));
        drop(world);
        log::trace!("deleted queue {:?}", cb.name);
        self.notify();
        Ok(())
    }

    fn tmr_create(&self, name: &str, callback: TmrCallback) -> Result<TmrHandle> {
        if context::in_isr() {
            return Err(ErrorCode::TmrIsr);
        }

        let mut world = self.lock();
        let key = world.tmrs.insert(TmrCb {
            name: name.to_owned(),
            callback,
            dly: 0,
            period: 0,
            state: TmrState::Unused,
            deadline: None,
        });
        Ok(handle!(TmrHandle, key))
    }

    fn tmr_set(&self, tmr: TmrHandle, dly: Tick, period: Tick) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TmrIsr);
        }
        if dly == 0 && period == 0 {
            return Err(ErrorCode::TmrInvalidDly);
        }

        let mut world = self.lock();
        let cb = world.tmr(tmr)?;
        cb.dly = dly;
        cb.period = period;
        if cb.state == TmrState::Unused {
            cb.state = TmrState::Stopped;
        }
        Ok(())
    }

    fn tmr_start(&self, tmr: TmrHandle) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TmrIsr);
        }

        let mut world = self.lock();
        let cb = world.tmr(tmr)?;
        if cb.state == TmrState::Unused {
            return Err(ErrorCode::TmrInvalidDly);
        }
        let first = if cb.dly > 0 { cb.dly } else { cb.period };
        let deadline = Instant::now() + self.ticks_to_duration(first);
        let cb = world.tmr(tmr)?;
        cb.deadline = Some(deadline);
        cb.state = TmrState::Running;
        drop(world);
        self.notify();
        Ok(())
    }

    fn tmr_stop(&self, tmr: TmrHandle) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TmrIsr);
        }

        let mut world = self.lock();
        let cb = world.tmr(tmr)?;
        if cb.state != TmrState::Running {
            return Err(ErrorCode::TmrStopped);
        }
        cb.state = TmrState::Stopped;
        cb.deadline = None;
        Ok(())
    }

    fn tmr_state(&self, tmr: TmrHandle) -> Result<TmrState> {
        Ok(self.lock().tmr(tmr)?.state)
    }

    fn tmr_del(&self, tmr: TmrHandle) -> Result<()> {
        if context::in_isr() {
            return Err(ErrorCode::TmrIsr);
        }

        let mut world = self.lock();
        world.tmr(tmr)?;
        let cb = world.tmrs.remove(slot(tmr.to_raw()));
        log::trace!("deleted timer {:?}", cb.name);
        Ok(())
    }
}
