//! Creation attributes.
//!
//! Each `*_new` call takes an attribute struct. All fields are optional; `Default::default()`
//! gives an unnamed object with layer-allocated storage.
//!
//! Caller-supplied storage must live for the rest of the program. The layer keeps it while the
//! object exists and hands it back (never frees it) when the object goes away.

use bitflags::bitflags;

use crate::{prio::Priority, storage::StackWord};

bitflags! {
    /// Thread attribute bits.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ThreadAttrBits: u32 {
        /// The thread can be joined (`osThreadJoinable`).
        const JOINABLE = 0x0000_0001;
    }
}

bitflags! {
    /// Mutex attribute bits.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MutexAttrBits: u32 {
        /// The owner may acquire the mutex again (`osMutexRecursive`).
        const RECURSIVE = 0x0000_0001;
        /// Priority inheritance (`osMutexPrioInherit`). Native mutexes always inherit.
        const PRIO_INHERIT = 0x0000_0002;
        /// Released when the owner terminates (`osMutexRobust`). Accepted and not enforced.
        const ROBUST = 0x0000_0008;
    }
}

/// Thread attributes (`osThreadAttr_t`).
#[derive(Debug, Default)]
pub struct ThreadAttr {
    pub name: Option<&'static str>,
    pub attr_bits: ThreadAttrBits,
    /// Control-block storage, at least [`ObjectId::CB_SIZE`](crate::ObjectId::CB_SIZE) bytes.
    pub cb_mem: Option<&'static mut [u8]>,
    /// Stack storage. Allocated by the layer if not given.
    pub stack_mem: Option<&'static mut [StackWord]>,
    /// Stack size in bytes. `0` selects the size of `stack_mem`, or the configured default.
    pub stack_size: usize,
    /// Initial priority. `None` selects [`Priority::Normal`].
    pub priority: Option<Priority>,
}

/// Mutex attributes (`osMutexAttr_t`).
#[derive(Debug, Default)]
pub struct MutexAttr {
    pub name: Option<&'static str>,
    pub attr_bits: MutexAttrBits,
    pub cb_mem: Option<&'static mut [u8]>,
}

/// Semaphore attributes (`osSemaphoreAttr_t`).
#[derive(Debug, Default)]
pub struct SemaphoreAttr {
    pub name: Option<&'static str>,
    pub attr_bits: u32,
    pub cb_mem: Option<&'static mut [u8]>,
}

/// Event flags attributes (`osEventFlagsAttr_t`).
#[derive(Debug, Default)]
pub struct EventFlagsAttr {
    pub name: Option<&'static str>,
    pub attr_bits: u32,
    pub cb_mem: Option<&'static mut [u8]>,
}

/// Timer attributes (`osTimerAttr_t`).
#[derive(Debug, Default)]
pub struct TimerAttr {
    pub name: Option<&'static str>,
    pub attr_bits: u32,
    pub cb_mem: Option<&'static mut [u8]>,
}

/// Message queue attributes (`osMessageQueueAttr_t`).
#[derive(Debug, Default)]
pub struct MessageQueueAttr {
    pub name: Option<&'static str>,
    pub attr_bits: u32,
    pub cb_mem: Option<&'static mut [u8]>,
    /// Message storage, at least `msg_count * msg_size` bytes.
    pub mq_mem: Option<&'static mut [u8]>,
}

impl ThreadAttr {
    /// Returns attributes for a named joinable thread.
    pub fn joinable(name: &'static str) -> Self {
        Self {
            name: Some(name),
            attr_bits: ThreadAttrBits::JOINABLE,
            ..Default::default()
        }
    }

    /// Sets the initial priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}
