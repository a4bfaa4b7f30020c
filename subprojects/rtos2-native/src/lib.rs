//! # rtos2-native
//!
//! The capability surface of a uC/OS-style preemptive kernel, as consumed by the `rtos2`
//! adaptation layer.
//!
//! The adaptation layer never schedules, switches context or counts ticks by itself. Everything
//! it needs from the wrapped kernel is expressed by the [`NativeKernel`] trait: create, destroy,
//! pend and post a native primitive with a timeout, and report a native [`ErrorCode`].
//!
//! The vocabulary mirrors the uC/OS-II and uC/OS-III APIs:
//! - Priorities are small integers where a **smaller number is more urgent** ([`NativePrio`]).
//! - Pends take a tick count where `0` means _wait forever_, plus [`PendOpt`] options
//!   (`NON_BLOCKING`, event-flag matching modes).
//! - Every primitive is addressed through an opaque handle type ([`TaskHandle`],
//!   [`SemHandle`], ...).
//!
//! ## References
//! - [uC/OS-III API reference](https://micrium.atlassian.net/wiki/spaces/osiiidoc)
//! - [uC/OS-II API reference](https://micrium.atlassian.net/wiki/spaces/osiidoc)

#![no_std]

extern crate alloc;

pub mod error;
pub mod handle;
pub mod kernel;
pub mod opt;
pub mod task;
pub mod tmr;

pub use error::{ErrorCode, Result};
pub use handle::{FlagGrpHandle, MutexHandle, QueueHandle, SemHandle, TaskHandle, TmrHandle};
pub use kernel::NativeKernel;
pub use opt::{FlagPostOpt, PendOpt};
pub use task::{NativePrio, TaskEntry, TaskSpec, TaskState};
pub use tmr::{TmrCallback, TmrState};

/// Native tick counter type (`OS_TICK`).
pub type Tick = u32;
