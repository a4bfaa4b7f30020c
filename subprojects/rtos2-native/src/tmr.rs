//! Native software timers.

use alloc::sync::Arc;

/// Timer expiry callback.
///
/// Runs in the context of the kernel's timer service task.
pub type TmrCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Native timer state (`OS_TMR_STATE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TmrState {
    /// Created but never configured.
    Unused,
    /// Configured and not counting.
    Stopped,
    /// Counting down.
    Running,
    /// A one-shot timer that has expired.
    Completed,
}
