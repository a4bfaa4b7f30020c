//! # rtos2-sim
//!
//! A hosted simulation of a uC/OS-style kernel, implementing [`NativeKernel`] on top of host
//! threads. It exists so that the `rtos2` adaptation layer can be exercised on a development
//! machine.
//!
//! ## Model
//!
//! - Every native task is a host thread. Tasks created before [`NativeKernel::start`] are held
//!   until the kernel starts. `start` returns to the caller, which keeps running as a _foreign_
//!   context: it may use every service, but [`NativeKernel::task_current`] reports `None` for it.
//! - Tasks really run in parallel. Priorities are bookkeeping only: they are validated, kept
//!   unique when [`SimConfig::unique_prios`] is set, and reported back, but they do not order
//!   execution. The scheduler lock is likewise only a counter.
//! - Deleting another task is deferred: the victim leaves at its next _deletion point_ (a
//!   blocking pend, a delay, a yield or a self-suspension) and never returns to its code.
//!   Suspending another task is deferred the same way.
//! - Interrupt context is emulated per host thread with [`SimKernel::enter_isr`].
//! - Software timers are served by a dedicated host thread started with the kernel.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use rtos2_native::{NativePrio, Tick};

mod context;
mod kernel;
mod task;
mod tmr;
mod world;

pub use context::{IsrGuard, in_isr};
pub use rtos2_native::NativeKernel;

use self::world::World;

/// Static configuration of a simulated kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Tick rate (`OS_CFG_TICK_RATE_HZ`).
    pub tick_rate_hz: u32,
    /// Numerically largest valid priority, held by the idle task.
    pub lowest_prio: NativePrio,
    /// Number of priorities at the low-urgency end held by system tasks (idle, statistics,
    /// timer, ...). Application tasks may not use them.
    pub reserved_prios: u8,
    /// Reject a task whose priority is already in use (uC/OS-II behavior).
    pub unique_prios: bool,
    /// Reported native version (`OS_VERSION`).
    pub version: u32,
}

impl SimConfig {
    /// A uC/OS-III configuration: 64 priorities, four system tasks, shared priorities allowed.
    pub fn ucos3() -> Self {
        Self {
            tick_rate_hz: 1000,
            lowest_prio: 63,
            reserved_prios: 4,
            unique_prios: false,
            version: 30804,
        }
    }

    /// A uC/OS-II configuration: 64 priorities, three system tasks, one task per priority.
    pub fn ucos2() -> Self {
        Self {
            tick_rate_hz: 1000,
            lowest_prio: 63,
            reserved_prios: 3,
            unique_prios: true,
            version: 29300,
        }
    }

    /// Numerically smallest priority reserved for system tasks.
    pub fn first_reserved_prio(&self) -> NativePrio {
        self.lowest_prio
            .saturating_sub(self.reserved_prios.saturating_sub(1))
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::ucos3()
    }
}

/// A simulated native kernel.
///
/// Cloning yields another reference to the same kernel.
#[derive(Clone)]
pub struct SimKernel {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: SimConfig,
    origin: Instant,
    world: Mutex<World>,
    cond: Condvar,
}

impl SimKernel {
    /// Creates a kernel in the not-initialized state.
    pub fn new(config: SimConfig) -> Self {
        log::trace!("SimKernel::new({config:?})");
        Self {
            shared: Arc::new(Shared {
                config,
                origin: Instant::now(),
                world: Mutex::new(World::new()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Creates a kernel with [`SimConfig::ucos3`].
    pub fn ucos3() -> Self {
        Self::new(SimConfig::ucos3())
    }

    /// Creates a kernel with [`SimConfig::ucos2`].
    pub fn ucos2() -> Self {
        Self::new(SimConfig::ucos2())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    /// Enters emulated interrupt context on the calling host thread.
    pub fn enter_isr(&self) -> IsrGuard {
        IsrGuard::enter()
    }

    /// Runs `f` in emulated interrupt context.
    pub fn run_in_isr<R>(&self, f: impl FnOnce() -> R) -> R {
        let _isr = self.enter_isr();
        f()
    }

    /// Returns the number of live tasks.
    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.shared
            .world
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.shared.cond.notify_all();
    }

    fn wait<'a>(&'a self, world: MutexGuard<'a, World>) -> MutexGuard<'a, World> {
        self.shared
            .cond
            .wait(world)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &'a self,
        world: MutexGuard<'a, World>,
        dur: Duration,
    ) -> MutexGuard<'a, World> {
        self.shared
            .cond
            .wait_timeout(world, dur)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }

    fn ticks_to_duration(&self, ticks: Tick) -> Duration {
        let hz = u64::from(self.shared.config.tick_rate_hz.max(1));
        Duration::from_micros(u64::from(ticks) * 1_000_000 / hz)
    }
}

impl core::fmt::Debug for SimKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimKernel")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
