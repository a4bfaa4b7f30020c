//! Kernel state and kernel-wide services.

use alloc::sync::Arc;

use rtos2_native::{NativeKernel, NativePrio, Tick};
use spin::Mutex as SpinMutex;

use crate::{
    error::{Error, Result},
    prio::{LEVEL_COUNT, PriorityBand},
    registry::Registry,
};

/// Version of the API implemented by the layer (2.2.0).
pub const API_VERSION: u32 = 0x0202_0000;

/// Run state of the kernel (`osKernelState_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KernelState {
    Inactive = 0,
    Ready = 1,
    Running = 2,
    Locked = 3,
    Error = -1,
}

/// Description of the wrapped native kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    id: &'static str,
    lowest_native: NativePrio,
    guard: u8,
    version_shift: u32,
    recursive_mutex: bool,
}

/// Error returned when a [`Profile`] does not describe a usable kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    /// Fewer than 50 native priorities remain above the system tasks.
    #[error("the native priority band ending at {lowest_usable} is too small")]
    BandTooSmall { lowest_usable: NativePrio },
    /// The native kernel reports a different priority range than the profile.
    #[error("profile expects lowest native priority {expected}, the kernel reports {actual}")]
    Mismatch {
        expected: NativePrio,
        actual: NativePrio,
    },
}

impl Profile {
    /// A uC/OS-III kernel built with `OS_CFG_PRIO_MAX = prio_max`.
    ///
    /// The four numerically largest priorities are left to the system tasks.
    pub fn ucos3(prio_max: u8) -> Result<Self, ProfileError> {
        Self {
            id: "uC/OS-III CMSIS-RTOS2",
            lowest_native: prio_max.saturating_sub(1),
            guard: 4,
            version_shift: 16,
            recursive_mutex: false,
        }
        .validated()
    }

    /// A uC/OS-II kernel built with `OS_LOWEST_PRIO = lowest_prio`.
    ///
    /// The three numerically largest priorities are left to the system tasks. Recursive
    /// mutexes are emulated by the layer.
    pub fn ucos2(lowest_prio: u8) -> Result<Self, ProfileError> {
        Self {
            id: "uC/OS-II CMSIS-RTOS2",
            lowest_native: lowest_prio,
            guard: 3,
            version_shift: 8,
            recursive_mutex: true,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ProfileError> {
        let lowest_usable = self.lowest_usable();
        if usize::from(lowest_usable) + 1 < LEVEL_COUNT || self.lowest_native < self.guard {
            return Err(ProfileError::BandTooSmall { lowest_usable });
        }
        Ok(self)
    }

    fn lowest_usable(&self) -> NativePrio {
        self.lowest_native.saturating_sub(self.guard)
    }

    /// Backend id reported by [`Kernel::info`].
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Numerically largest native priority (the idle task).
    pub fn lowest_native(&self) -> NativePrio {
        self.lowest_native
    }

    /// Native priorities available to application threads.
    pub fn band(&self) -> PriorityBand {
        PriorityBand::new(self.lowest_usable())
    }

    /// Whether mutexes may be created with the recursive attribute.
    pub fn recursive_mutex(&self) -> bool {
        self.recursive_mutex
    }

    /// Encodes a native version number as an `osVersion_t` kernel version.
    pub fn kernel_version(&self, native: u32) -> u32 {
        native << self.version_shift
    }
}

/// Tunables of the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Stack size in bytes of a thread created without one.
    pub default_stack_size: usize,
    /// Smallest stack a thread is given, in [`StackWord`](crate::StackWord)s.
    pub min_stack_words: usize,
    /// System timer frequency. `None` reports the tick rate.
    pub sys_timer_freq: Option<u32>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_stack_size: 512,
            min_stack_words: 96,
            sys_timer_freq: None,
        }
    }
}

/// Versions and backend id (`osKernelGetInfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelInfo {
    pub api_version: u32,
    pub kernel_version: u32,
    pub id: &'static str,
}

impl KernelInfo {
    /// Copies the NUL-terminated id into `buf`, truncating it to the buffer. Returns the number
    /// of bytes written.
    pub fn copy_id(&self, buf: &mut [u8]) -> usize {
        let id = self.id.as_bytes();
        let len = buf.len().min(id.len() + 1);
        for (dst, src) in buf[..len].iter_mut().zip(id.iter().chain([&0])) {
            *dst = *src;
        }
        len
    }
}

/// The adaptation layer bound to one native kernel.
///
/// Every operation of the layer is a method of `Kernel`. Cloning yields another reference to
/// the same kernel state.
pub struct Kernel<K: NativeKernel> {
    pub(crate) inner: Arc<KernelInner<K>>,
}

pub(crate) struct KernelInner<K> {
    pub native: K,
    pub profile: Profile,
    pub config: KernelConfig,
    pub band: PriorityBand,
    ctl: SpinMutex<Control>,
    pub registry: SpinMutex<Registry>,
}

struct Control {
    initialized: bool,
    state: KernelState,
    tick_freq: u32,
}

impl<K: NativeKernel> Clone for Kernel<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Binds the layer to a native kernel with the default [`KernelConfig`].
    pub fn new(native: K, profile: Profile) -> Result<Self, ProfileError> {
        Self::with_config(native, profile, KernelConfig::default())
    }

    pub fn with_config(
        native: K,
        profile: Profile,
        config: KernelConfig,
    ) -> Result<Self, ProfileError> {
        let actual = native.lowest_prio();
        if actual != profile.lowest_native {
            return Err(ProfileError::Mismatch {
                expected: profile.lowest_native,
                actual,
            });
        }

        let band = profile.band();
        log::debug!(
            "{}: native priorities {}..={} for application threads",
            profile.id,
            band.highest_usable(),
            band.lowest_usable()
        );

        Ok(Self {
            inner: Arc::new(KernelInner {
                native,
                profile,
                config,
                band,
                ctl: SpinMutex::new(Control {
                    initialized: false,
                    state: KernelState::Inactive,
                    tick_freq: 0,
                }),
                registry: SpinMutex::new(Registry::new()),
            }),
        })
    }

    /// Returns the wrapped native kernel.
    pub fn native(&self) -> &K {
        &self.inner.native
    }

    pub fn profile(&self) -> &Profile {
        &self.inner.profile
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    /// Initializes the native kernel (`osKernelInitialize`).
    pub fn initialize(&self) -> Result<()> {
        self.check_isr()?;

        let mut ctl = self.inner.ctl.lock();
        if ctl.state != KernelState::Inactive {
            return Err(Error::Unknown);
        }
        self.inner.native.init().map_err(|err| {
            log::warn!("native kernel initialization failed: {err}");
            Error::Unknown
        })?;

        ctl.initialized = true;
        ctl.state = KernelState::Ready;
        ctl.tick_freq = self.inner.native.tick_rate_hz();
        log::debug!("kernel initialized ({} Hz)", ctl.tick_freq);
        Ok(())
    }

    /// Starts scheduling (`osKernelStart`).
    pub fn start(&self) -> Result<()> {
        self.check_isr()?;

        {
            let mut ctl = self.inner.ctl.lock();
            if !ctl.initialized || ctl.state != KernelState::Ready {
                return Err(Error::Unknown);
            }
            ctl.state = KernelState::Running;
        }

        self.inner.native.start().map_err(|err| {
            log::warn!("native kernel start failed: {err}");
            Error::Unknown
        })
    }

    /// Returns the run state (`osKernelGetState`).
    pub fn state(&self) -> KernelState {
        if self.inner.native.is_running() {
            return if self.inner.native.sched_lock_nesting() > 0 {
                KernelState::Locked
            } else {
                KernelState::Running
            };
        }

        let ctl = self.inner.ctl.lock();
        if ctl.initialized {
            ctl.state
        } else {
            KernelState::Inactive
        }
    }

    /// Returns versions and the backend id (`osKernelGetInfo`).
    pub fn info(&self) -> KernelInfo {
        KernelInfo {
            api_version: API_VERSION,
            kernel_version: self
                .inner
                .profile
                .kernel_version(self.inner.native.version()),
            id: self.inner.profile.id,
        }
    }

    /// Locks the scheduler (`osKernelLock`). Returns the previous lock state.
    pub fn lock(&self) -> Result<bool> {
        self.check_running()?;

        let previous = self.is_locked();
        self.inner
            .native
            .sched_lock()
            .map_err(|_| Error::Unknown)?;
        Ok(previous)
    }

    /// Unlocks the scheduler one level (`osKernelUnlock`). Returns the previous lock state.
    pub fn unlock(&self) -> Result<bool> {
        self.check_running()?;

        if !self.is_locked() {
            return Ok(false);
        }
        self.inner
            .native
            .sched_unlock()
            .map_err(|_| Error::Unknown)?;
        Ok(true)
    }

    /// Restores a lock state returned by [`lock`](Self::lock) or [`unlock`](Self::unlock)
    /// (`osKernelRestoreLock`). Returns the new lock state.
    pub fn restore_lock(&self, locked: bool) -> Result<bool> {
        self.check_running()?;

        let native = &self.inner.native;
        if locked {
            native.sched_lock().map_err(|_| Error::Unknown)?;
        } else {
            while native.sched_lock_nesting() > 0 {
                native.sched_unlock().map_err(|_| Error::Unknown)?;
            }
        }
        Ok(self.is_locked())
    }

    /// Returns the native tick counter.
    pub fn tick_count(&self) -> Tick {
        self.inner.native.time_get()
    }

    /// Returns the tick frequency recorded by [`initialize`](Self::initialize).
    pub fn tick_freq(&self) -> u32 {
        self.inner.ctl.lock().tick_freq
    }

    pub fn sys_timer_count(&self) -> u32 {
        self.inner.native.time_get()
    }

    pub fn sys_timer_freq(&self) -> u32 {
        self.inner
            .config
            .sys_timer_freq
            .unwrap_or_else(|| self.tick_freq())
    }

    /// Waits for `ticks` kernel ticks (`osDelay`). A zero delay yields.
    pub fn delay(&self, ticks: u32) -> Result<()> {
        self.check_running()?;
        self.inner
            .native
            .time_dly(ticks)
            .map_err(|_| Error::Unknown)
    }

    /// Waits until the tick counter reaches `ticks` (`osDelayUntil`).
    pub fn delay_until(&self, ticks: u32) -> Result<()> {
        self.check_running()?;

        let now = self.inner.native.time_get();
        if ticks <= now {
            return Err(Error::Parameter);
        }
        self.inner
            .native
            .time_dly(ticks - now)
            .map_err(|_| Error::Unknown)
    }

    fn is_locked(&self) -> bool {
        self.inner.native.sched_lock_nesting() > 0
    }

    pub(crate) fn in_isr(&self) -> bool {
        self.inner.native.in_isr()
    }

    /// Rejects interrupt context.
    pub(crate) fn check_isr(&self) -> Result<()> {
        if self.in_isr() {
            return Err(Error::Isr);
        }
        Ok(())
    }

    /// Rejects interrupt context and a kernel that is not scheduling.
    pub(crate) fn check_running(&self) -> Result<()> {
        self.check_isr()?;
        if !self.inner.native.is_running() {
            return Err(Error::Unknown);
        }
        Ok(())
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.inner.ctl.lock().initialized
    }
}

impl<K: NativeKernel + core::fmt::Debug> core::fmt::Debug for Kernel<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("native", &self.inner.native)
            .field("profile", &self.inner.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_bands() {
        let ucos3 = Profile::ucos3(64).unwrap();
        assert_eq!(ucos3.band().lowest_usable(), 59);
        assert_eq!(ucos3.band().highest_usable(), 10);
        assert!(!ucos3.recursive_mutex());

        let ucos2 = Profile::ucos2(63).unwrap();
        assert_eq!(ucos2.band().lowest_usable(), 60);
        assert_eq!(ucos2.band().highest_usable(), 11);
        assert!(ucos2.recursive_mutex());
    }

    #[test]
    fn profile_rejects_small_bands() {
        assert_eq!(
            Profile::ucos3(32),
            Err(ProfileError::BandTooSmall { lowest_usable: 27 })
        );
        assert!(Profile::ucos3(54).is_ok());
        assert!(Profile::ucos3(53).is_err());
        assert!(Profile::ucos2(52).is_ok());
        assert!(Profile::ucos2(51).is_err());
    }

    #[test]
    fn kernel_versions() {
        assert_eq!(Profile::ucos3(64).unwrap().kernel_version(30804), 30804 << 16);
        assert_eq!(Profile::ucos2(63).unwrap().kernel_version(29300), 29300 << 8);
    }

    #[test]
    fn copy_id_truncates() {
        let info = KernelInfo {
            api_version: API_VERSION,
            kernel_version: 0,
            id: "uC/OS-III CMSIS-RTOS2",
        };

        let mut small = [0xFF; 4];
        assert_eq!(info.copy_id(&mut small), 4);
        assert_eq!(&small, b"uC/O");

        let mut large = [0xFF; 32];
        assert_eq!(info.copy_id(&mut large), info.id.len() + 1);
        assert_eq!(&large[..info.id.len()], info.id.as_bytes());
        assert_eq!(large[info.id.len()], 0);
        assert_eq!(large[info.id.len() + 1], 0xFF);

        assert_eq!(info.copy_id(&mut []), 0);
    }
}
