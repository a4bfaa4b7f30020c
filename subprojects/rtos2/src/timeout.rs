//! Timeout conversion.

use rtos2_native::{PendOpt, Tick};

/// Timeout value that waits without bound (`osWaitForever`).
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Converts an API timeout to a native pend timeout and options.
///
/// - `0` is a non-blocking try.
/// - [`WAIT_FOREVER`] blocks without bound, which the native kernel spells as a zero timeout.
/// - Anything else is a bounded wait in ticks.
pub(crate) fn pend_args(timeout: u32) -> (Tick, PendOpt) {
    match timeout {
        0 => (0, PendOpt::NON_BLOCKING),
        WAIT_FOREVER => (0, PendOpt::empty()),
        ticks => (ticks, PendOpt::empty()),
    }
}

/// Returns `true` if a call with this timeout may block.
pub(crate) const fn may_block(timeout: u32) -> bool {
    timeout != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(pend_args(0), (0, PendOpt::NON_BLOCKING));
        assert_eq!(pend_args(WAIT_FOREVER), (0, PendOpt::empty()));
        assert_eq!(pend_args(25), (25, PendOpt::empty()));
        assert!(!may_block(0));
        assert!(may_block(1));
    }
}
