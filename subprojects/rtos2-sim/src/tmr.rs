//! Timer service thread (`OS_TmrTask`).

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    thread,
    time::{Duration, Instant},
};

use rtos2_native::{TmrCallback, TmrState};

use crate::{Shared, SimKernel};

/// Upper bound of a single service wait, so that the thread notices a dropped kernel.
const SERVICE_POLL: Duration = Duration::from_millis(50);

impl SimKernel {
    pub(crate) fn spawn_timer_service(&self) {
        let shared = Arc::downgrade(&self.shared);
        let spawned = thread::Builder::new()
            .name("sim.tmr".into())
            .spawn(move || service(shared));

        if let Err(err) = spawned {
            log::error!("failed to spawn the timer service thread: {err}");
        }
    }
}

fn service(shared: Weak<Shared>) {
    log::trace!("timer service started");

    while let Some(shared) = shared.upgrade() {
        let kernel = SimKernel { shared };
        for callback in kernel.collect_expired() {
            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                log::error!("timer callback panicked");
            }
        }
    }

    log::trace!("timer service stopped");
}

impl SimKernel {
    /// Waits for the next expiry (bounded by [`SERVICE_POLL`]) and returns the callbacks of all
    /// expired timers, rearming periodic ones.
    fn collect_expired(&self) -> Vec<TmrCallback> {
        let mut world = self.lock();

        let next = world.tmrs.iter().filter_map(|(_, tmr)| tmr.deadline).min();
        let now = Instant::now();
        match next {
            Some(deadline) if deadline <= now => {}
            Some(deadline) => {
                world = self.wait_timeout(world, (deadline - now).min(SERVICE_POLL));
            }
            None => world = self.wait_timeout(world, SERVICE_POLL),
        }

        let now = Instant::now();
        let mut expired = Vec::new();
        for (_, tmr) in world.tmrs.iter_mut() {
            let Some(deadline) = tmr.deadline else {
                continue;
            };
            if deadline > now {
                continue;
            }

            if tmr.period > 0 {
                tmr.deadline = Some(deadline + self.ticks_to_duration(tmr.period));
            } else {
                tmr.deadline = None;
                tmr.state = TmrState::Completed;
            }
            log::trace!("timer {:?} expired", tmr.name);
            expired.push(Arc::clone(&tmr.callback));
        }

        expired
    }
}
