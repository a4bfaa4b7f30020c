//! Priority mapping.
//!
//! The abstract priority space is a fixed, ordered set of 50 levels, from [`Priority::Idle`] to
//! [`Priority::Isr`]. The native kernel numbers its priorities the other way round: a smaller
//! number is more urgent, and the numerically largest priorities are held by system tasks (idle,
//! statistics, timer, ...).
//!
//! A [`PriorityBand`] is a contiguous run of 50 native priorities directly above the system
//! tasks. Level ordinal `n` (0 for `Idle`) maps to native priority `lowest_usable - n`, so the
//! relative order of the levels is preserved:
//!
//! ```text
//!   native:   highest_usable ............................ lowest_usable | system tasks
//!   level:    Isr  Realtime7 ... Normal ... Low1  Low   Idle            |
//! ```

use rtos2_native::NativePrio;

/// Raw value of "no priority given" (`osPriorityNone`).
pub const PRIORITY_NONE: i32 = 0;

/// Raw value reported for an invalid thread (`osPriorityError`).
pub const PRIORITY_ERROR: i32 = -1;

/// Number of abstract priority levels.
pub const LEVEL_COUNT: usize = 50;

macro_rules! define_priorities {
    { $($(#[$meta:meta])* $name:ident = $value:literal,)* } => {
        /// Abstract thread priority (`osPriority_t`).
        ///
        /// Larger discriminants are more urgent.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(i32)]
        pub enum Priority {
            $($(#[$meta])* $name = $value,)*
        }

        impl Priority {
            /// All levels, least urgent first. A level's index is its ordinal.
            pub const LEVELS: [Priority; LEVEL_COUNT] = [$(Priority::$name,)*];
        }
    };
}

define_priorities! {
    /// Reserved for the idle thread.
    Idle = 1,
    Low = 8,
    Low1 = 9,
    Low2 = 10,
    Low3 = 11,
    Low4 = 12,
    Low5 = 13,
    Low6 = 14,
    Low7 = 15,
    BelowNormal = 16,
    BelowNormal1 = 17,
    BelowNormal2 = 18,
    BelowNormal3 = 19,
    BelowNormal4 = 20,
    BelowNormal5 = 21,
    BelowNormal6 = 22,
    BelowNormal7 = 23,
    /// Default priority of a new thread.
    Normal = 24,
    Normal1 = 25,
    Normal2 = 26,
    Normal3 = 27,
    Normal4 = 28,
    Normal5 = 29,
    Normal6 = 30,
    Normal7 = 31,
    AboveNormal = 32,
    AboveNormal1 = 33,
    AboveNormal2 = 34,
    AboveNormal3 = 35,
    AboveNormal4 = 36,
    AboveNormal5 = 37,
    AboveNormal6 = 38,
    AboveNormal7 = 39,
    High = 40,
    High1 = 41,
    High2 = 42,
    High3 = 43,
    High4 = 44,
    High5 = 45,
    High6 = 46,
    High7 = 47,
    Realtime = 48,
    Realtime1 = 49,
    Realtime2 = 50,
    Realtime3 = 51,
    Realtime4 = 52,
    Realtime5 = 53,
    Realtime6 = 54,
    Realtime7 = 55,
    /// Reserved for ISR deferred threads.
    Isr = 56,
}

impl Priority {
    /// Converts a raw `osPriority_t` value. Returns `None` for values that are not levels,
    /// including [`PRIORITY_NONE`] and [`PRIORITY_ERROR`].
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::LEVELS
            .binary_search_by_key(&raw, |level| level.to_raw())
            .ok()
            .map(|ordinal| Self::LEVELS[ordinal])
    }

    /// Returns the raw `osPriority_t` value.
    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    /// Returns the position of the level in [`Priority::LEVELS`].
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Isr => LEVEL_COUNT - 1,
            // Low (8) has ordinal 1 and the remaining levels are contiguous.
            level => (level as i32 - Self::Low as i32) as usize + 1,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// The band of native priorities assigned to application threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityBand {
    lowest: NativePrio,
    highest: NativePrio,
}

impl PriorityBand {
    /// Creates the band ending at `lowest_usable`, the numerically largest native priority
    /// available to application threads.
    pub const fn new(lowest_usable: NativePrio) -> Self {
        Self {
            lowest: lowest_usable,
            highest: lowest_usable.saturating_sub((LEVEL_COUNT - 1) as NativePrio),
        }
    }

    /// The least urgent native priority of the band.
    pub const fn lowest_usable(&self) -> NativePrio {
        self.lowest
    }

    /// The most urgent native priority of the band.
    pub const fn highest_usable(&self) -> NativePrio {
        self.highest
    }

    /// Returns `true` if `native` lies within the band.
    pub const fn contains(&self, native: NativePrio) -> bool {
        native >= self.highest && native <= self.lowest
    }

    /// Maps a level onto its native priority.
    pub fn encode(&self, level: Priority) -> NativePrio {
        let ordinal = level.ordinal().min(NativePrio::MAX as usize) as NativePrio;
        self.lowest
            .saturating_sub(ordinal)
            .clamp(self.highest, self.lowest)
    }

    /// Maps a raw `osPriority_t` value onto its native priority. Values that are not levels are
    /// treated as [`Priority::Normal`].
    pub fn encode_raw(&self, raw: i32) -> NativePrio {
        self.encode(Priority::from_raw(raw).unwrap_or(Priority::Normal))
    }

    /// Maps a native priority back to its level. Returns `None` outside of the band.
    pub fn decode(&self, native: NativePrio) -> Option<Priority> {
        if !self.contains(native) {
            return None;
        }
        Priority::LEVELS
            .get(usize::from(self.lowest - native))
            .copied()
    }

    /// Finds a free native priority for `level`.
    ///
    /// Starts at [`encode`](Self::encode) and probes toward more urgent priorities while
    /// `in_use` reports the slot as taken, stopping at the most urgent end of the band.
    pub fn allocate(
        &self,
        level: Priority,
        mut in_use: impl FnMut(NativePrio) -> bool,
    ) -> Option<NativePrio> {
        (self.highest..=self.encode(level))
            .rev()
            .find(|&native| !in_use(native))
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    const UCOS3: PriorityBand = PriorityBand::new(64 - 1 - 4);

    #[test]
    fn levels_are_sorted_and_ordinals_match() {
        for (ordinal, level) in Priority::LEVELS.iter().enumerate() {
            assert_eq!(level.ordinal(), ordinal, "{level:?}");
            assert_eq!(Priority::from_raw(level.to_raw()), Some(*level));
        }
        assert!(Priority::LEVELS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn band_bounds() {
        assert_eq!(UCOS3.lowest_usable(), 59);
        assert_eq!(UCOS3.highest_usable(), 10);
        assert_eq!(UCOS3.encode(Priority::Idle), 59);
        assert_eq!(UCOS3.encode(Priority::Normal), 59 - 17);
        assert_eq!(UCOS3.encode(Priority::Isr), 10);
    }

    #[test]
    fn small_band_clamps_at_zero() {
        let band = PriorityBand::new(20);
        assert_eq!(band.highest_usable(), 0);
        assert_eq!(band.encode(Priority::Isr), 0);
        assert_eq!(band.encode(Priority::Realtime), 0);
        assert_eq!(band.encode(Priority::Low), 19);
    }

    #[test]
    fn decode_outside_band() {
        assert_eq!(UCOS3.decode(60), None);
        assert_eq!(UCOS3.decode(9), None);
        assert_eq!(UCOS3.decode(59), Some(Priority::Idle));
        assert_eq!(UCOS3.decode(10), Some(Priority::Isr));
    }

    #[test]
    fn allocate_probes_toward_more_urgent() {
        let taken = [UCOS3.encode(Priority::Normal)];
        let native = UCOS3.allocate(Priority::Normal, |p| taken.contains(&p));
        assert_eq!(native, Some(UCOS3.encode(Priority::Normal) - 1));
    }

    #[test]
    fn allocate_fails_when_band_is_exhausted() {
        assert_eq!(UCOS3.allocate(Priority::Normal, |_| true), None);
        // Only less urgent slots are free.
        let start = UCOS3.encode(Priority::High);
        assert_eq!(UCOS3.allocate(Priority::High, |p| p <= start), None);
    }

    #[quickcheck]
    fn qc_decode_inverts_encode(lowest: u8, index: usize) -> bool {
        let band = PriorityBand::new(lowest.max(49));
        let level = Priority::LEVELS[index % LEVEL_COUNT];
        band.decode(band.encode(level)) == Some(level)
    }

    #[quickcheck]
    fn qc_unknown_raw_values_encode_as_normal(raw: i32) -> bool {
        match Priority::from_raw(raw) {
            Some(level) => UCOS3.encode_raw(raw) == UCOS3.encode(level),
            None => UCOS3.encode_raw(raw) == UCOS3.encode(Priority::Normal),
        }
    }

    #[quickcheck]
    fn qc_allocate_stays_in_band_and_never_less_urgent(index: usize, taken: Vec<u8>) -> bool {
        let level = Priority::LEVELS[index % LEVEL_COUNT];
        match UCOS3.allocate(level, |p| taken.contains(&p)) {
            Some(native) => {
                UCOS3.contains(native) && native <= UCOS3.encode(level) && !taken.contains(&native)
            }
            None => (UCOS3.highest_usable()..=UCOS3.encode(level)).all(|p| taken.contains(&p)),
        }
    }
}
