//! Kernel data structures.
//!
//! All control blocks live in one [`World`] guarded by a single host mutex. Each table is a
//! [`Slab`]; the slot index is the raw native handle and every control block carries a creation
//! serial so that a waiter can tell "my object was deleted" from "my slot was reused".

use std::{collections::VecDeque, thread::ThreadId, time::Instant};

use rtos2_native::{
    ErrorCode, FlagGrpHandle, MutexHandle, NativePrio, QueueHandle, Result, SemHandle, TaskHandle,
    TaskState, Tick, TmrCallback, TmrHandle, TmrState, handle::RawHandle,
};
use slab::Slab;

pub(crate) struct World {
    pub initialized: bool,
    pub running: bool,
    pub sched_lock: u8,
    pub tasks: Slab<Tcb>,
    pub sems: Slab<SemCb>,
    pub mutexes: Slab<MutexCb>,
    pub flag_grps: Slab<FlagGrpCb>,
    pub queues: Slab<QueueCb>,
    pub tmrs: Slab<TmrCb>,
    next_serial: u64,
}

impl World {
    pub fn new() -> Self {
        Self {
            initialized: false,
            running: false,
            sched_lock: 0,
            tasks: Slab::new(),
            sems: Slab::new(),
            mutexes: Slab::new(),
            flag_grps: Slab::new(),
            queues: Slab::new(),
            tmrs: Slab::new(),
            next_serial: 1,
        }
    }

    pub fn next_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    pub fn task(&mut self, task: TaskHandle) -> Result<&mut Tcb> {
        self.tasks
            .get_mut(slot(task.to_raw()))
            .ok_or(ErrorCode::TaskNotExist)
    }

    pub fn sem(&mut self, sem: SemHandle) -> Result<&mut SemCb> {
        self.sems
            .get_mut(slot(sem.to_raw()))
            .ok_or(ErrorCode::ObjPtrNull)
    }

    pub fn mutex(&mut self, mutex: MutexHandle) -> Result<&mut MutexCb> {
        self.mutexes
            .get_mut(slot(mutex.to_raw()))
            .ok_or(ErrorCode::ObjPtrNull)
    }

    pub fn flag_grp(&mut self, grp: FlagGrpHandle) -> Result<&mut FlagGrpCb> {
        self.flag_grps
            .get_mut(slot(grp.to_raw()))
            .ok_or(ErrorCode::ObjPtrNull)
    }

    pub fn queue(&mut self, queue: QueueHandle) -> Result<&mut QueueCb> {
        self.queues
            .get_mut(slot(queue.to_raw()))
            .ok_or(ErrorCode::ObjPtrNull)
    }

    pub fn tmr(&mut self, tmr: TmrHandle) -> Result<&mut TmrCb> {
        self.tmrs
            .get_mut(slot(tmr.to_raw()))
            .ok_or(ErrorCode::ObjPtrNull)
    }
}

pub(crate) fn slot(raw: RawHandle) -> usize {
    raw as usize
}

/// Task control block.
pub(crate) struct Tcb {
    pub name: String,
    pub prio: NativePrio,
    pub serial: u64,
    pub thread: Option<ThreadId>,
    pub suspend_ctr: u8,
    pub wait: Wait,
}

impl Tcb {
    pub fn state(&self) -> TaskState {
        let suspended = self.suspend_ctr > 0;
        match (self.wait, suspended) {
            (Wait::None, false) => TaskState::Ready,
            (Wait::None, true) => TaskState::Suspended,
            (Wait::Delay, false) => TaskState::Delayed,
            (Wait::Delay, true) => TaskState::DelayedSuspended,
            (Wait::Pend, false) => TaskState::Pend,
            (Wait::PendTimeout, false) => TaskState::PendTimeout,
            (Wait::Pend | Wait::PendTimeout, true) => TaskState::PendSuspended,
        }
    }
}

/// What a task is blocked on, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    None,
    Delay,
    Pend,
    PendTimeout,
}

pub(crate) struct SemCb {
    pub name: String,
    pub serial: u64,
    pub count: u32,
}

pub(crate) struct MutexCb {
    pub name: String,
    pub serial: u64,
    pub owner: Option<Owner>,
}

/// Mutex owner. Host threads that are not tasks may own mutexes too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Owner {
    pub thread: ThreadId,
    pub task: Option<usize>,
}

pub(crate) struct FlagGrpCb {
    pub name: String,
    pub serial: u64,
    pub flags: u32,
}

pub(crate) struct QueueCb {
    pub name: String,
    pub serial: u64,
    pub depth: usize,
    pub msgs: VecDeque<usize>,
}

pub(crate) struct TmrCb {
    pub name: String,
    pub callback: TmrCallback,
    pub dly: Tick,
    pub period: Tick,
    pub state: TmrState,
    pub deadline: Option<Instant>,
}
