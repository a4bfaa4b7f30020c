//! # rtos2
//!
//! A CMSIS-RTOS2 style API on top of a uC/OS-II or uC/OS-III style kernel.
//!
//! The layer owns no scheduler. Every service is expressed through the
//! [`NativeKernel`](rtos2_native::NativeKernel) capability trait; the layer adds what the
//! native kernel lacks:
//!
//! - an abstract priority space of 50 levels, mapped onto a band of native priorities clear of
//!   the system tasks ([`prio`]),
//! - a registry resolving native task handles back to thread objects,
//! - thread join, detach and an exactly-once teardown built from native semaphores and task
//!   deletion,
//! - a closed status vocabulary ([`Error`]) translated from the native error codes.
//!
//! All operations are methods of [`Kernel`], which is created once per native kernel and
//! shared by cloning.
//!
//! ```ignore
//! let kernel = Kernel::new(native, Profile::ucos3(64)?)?;
//! kernel.initialize()?;
//! let worker = kernel.thread_try_new(|| { /* ... */ }, ThreadAttr::joinable("worker"))?;
//! kernel.start()?;
//! kernel.thread_join(&worker)?;
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod attr;
pub mod error;
pub mod event_flags;
pub mod kernel;
pub mod message_queue;
mod mutex;
mod object;
pub mod prio;
mod registry;
mod semaphore;
mod storage;
pub mod thread;
mod timeout;
pub mod timer;

pub use self::{
    attr::{
        EventFlagsAttr, MessageQueueAttr, MutexAttr, MutexAttrBits, SemaphoreAttr, ThreadAttr,
        ThreadAttrBits, TimerAttr,
    },
    error::{Error, FLAGS_ERROR, Result, STATUS_OK, flags_raw, status_raw},
    event_flags::{FLAGS_MASK, FlagsOptions},
    kernel::{API_VERSION, Kernel, KernelConfig, KernelInfo, KernelState, Profile, ProfileError},
    message_queue::MSG_SIZE,
    object::{ObjectId, ObjectKind},
    prio::{Priority, PriorityBand},
    storage::StackWord,
    thread::ThreadState,
    timeout::WAIT_FOREVER,
    timer::TimerType,
};
