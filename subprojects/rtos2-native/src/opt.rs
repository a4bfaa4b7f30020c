//! Service options (`OS_OPT`).

use bitflags::bitflags;

bitflags! {
    /// Options accepted by the native pend services.
    ///
    /// An empty set is a plain blocking pend. The `FLAG_*` bits are only meaningful to the event
    /// flag pend, where exactly one of [`FLAG_SET_ALL`] and [`FLAG_SET_ANY`] must be present.
    ///
    /// [`FLAG_SET_ALL`]: PendOpt::FLAG_SET_ALL
    /// [`FLAG_SET_ANY`]: PendOpt::FLAG_SET_ANY
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PendOpt: u16 {
        /// Wait until all the requested flags are set.
        const FLAG_SET_ALL = 0x0004;
        /// Wait until any of the requested flags is set.
        const FLAG_SET_ANY = 0x0008;
        /// Clear the matched flags when the pend is satisfied.
        const FLAG_CONSUME = 0x0100;
        /// Return [`PendWouldBlock`] instead of blocking.
        ///
        /// [`PendWouldBlock`]: crate::ErrorCode::PendWouldBlock
        const NON_BLOCKING = 0x8000;
    }
}

impl PendOpt {
    /// Returns `true` if the pend may block the caller.
    pub const fn is_blocking(&self) -> bool {
        !self.contains(Self::NON_BLOCKING)
    }
}

/// Event flag post operation (`OS_OPT_POST_FLAG_SET` / `OS_OPT_POST_FLAG_CLR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPostOpt {
    /// Set the given flags.
    Set,
    /// Clear the given flags.
    Clear,
}
