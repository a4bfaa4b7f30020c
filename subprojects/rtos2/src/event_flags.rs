//! Event flags.

use bitflags::bitflags;
use rtos2_native::{FlagGrpHandle, FlagPostOpt, NativeKernel, PendOpt};
use spin::Mutex as SpinMutex;

use crate::{
    attr::EventFlagsAttr,
    error::{self, Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId, ObjectKind},
    timeout::{may_block, pend_args},
};

const FLAGS_NAME: &str = "cmsis.flags";

/// Flags usable in a group. The top bit is reserved for error encoding.
pub const FLAGS_MASK: u32 = 0x7FFF_FFFF;

bitflags! {
    /// Wait options (`osFlagsWaitAny`, `osFlagsWaitAll`, `osFlagsNoClear`).
    ///
    /// The empty set waits for any flag and clears the flags it matched.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct FlagsOptions: u32 {
        /// Wait for all requested flags instead of any.
        const WAIT_ALL = 0x0000_0001;
        /// Leave the matched flags set.
        const NO_CLEAR = 0x0000_0002;
    }
}

impl FlagsOptions {
    /// Converts raw option bits. Bits other than [`WAIT_ALL`](Self::WAIT_ALL) and
    /// [`NO_CLEAR`](Self::NO_CLEAR) are a parameter error.
    pub fn from_raw(raw: u32) -> Result<Self> {
        Self::from_bits(raw).ok_or(Error::Parameter)
    }

    fn pend_opt(self, timeout: u32) -> PendOpt {
        let mut opt = if self.contains(Self::WAIT_ALL) {
            PendOpt::FLAG_SET_ALL
        } else {
            PendOpt::FLAG_SET_ANY
        };
        if !self.contains(Self::NO_CLEAR) {
            opt |= PendOpt::FLAG_CONSUME;
        }
        opt | pend_args(timeout).1
    }
}

pub(crate) struct EventFlagsControl {
    /// `None` once deleted.
    native: SpinMutex<Option<FlagGrpHandle>>,
}

impl EventFlagsControl {
    fn handle(&self) -> Result<FlagGrpHandle> {
        self.native.lock().ok_or(Error::Parameter)
    }
}

fn check_flags(flags: u32) -> Result<u32> {
    if flags == 0 || flags & !FLAGS_MASK != 0 {
        return Err(Error::Parameter);
    }
    Ok(flags)
}

impl<K: NativeKernel> Kernel<K> {
    /// Creates an event flag group with all flags clear (`osEventFlagsNew`). Returns `None` on
    /// any failure.
    pub fn event_flags_new(&self, attr: EventFlagsAttr) -> Option<ObjectId> {
        self.event_flags_try_new(attr)
            .inspect_err(|err| log::debug!("event flags creation failed: {err}"))
            .ok()
    }

    pub fn event_flags_try_new(&self, attr: EventFlagsAttr) -> Result<ObjectId> {
        self.check_isr()?;

        let header = Header::new(attr.name, attr.attr_bits, attr.cb_mem)?;
        let grp = self
            .inner
            .native
            .flag_create(attr.name.unwrap_or(FLAGS_NAME), 0)
            .map_err(|err| {
                log::debug!("native flag group creation failed: {err}");
                Error::Resource
            })?;

        Ok(ObjectId::new(
            header,
            Body::EventFlags(EventFlagsControl {
                native: SpinMutex::new(Some(grp)),
            }),
        ))
    }

    pub fn event_flags_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::EventFlags)
    }

    /// Sets flags (`osEventFlagsSet`). Returns the flags of the group after the operation.
    pub fn event_flags_set(&self, id: &ObjectId, flags: u32) -> Result<u32> {
        self.event_flags_post(id, flags, FlagPostOpt::Set)
    }

    /// Clears flags (`osEventFlagsClear`). Returns the flags of the group after the operation.
    pub fn event_flags_clear(&self, id: &ObjectId, flags: u32) -> Result<u32> {
        self.event_flags_post(id, flags, FlagPostOpt::Clear)
    }

    fn event_flags_post(&self, id: &ObjectId, flags: u32, opt: FlagPostOpt) -> Result<u32> {
        let grp = id.as_event_flags()?.handle()?;
        let flags = check_flags(flags)?;
        self.inner
            .native
            .flag_post(grp, flags, opt)
            .map_err(error::from_flags)
    }

    /// Returns the current flags (`osEventFlagsGet`).
    pub fn event_flags_get(&self, id: &ObjectId) -> Result<u32> {
        let grp = id.as_event_flags()?.handle()?;
        self.inner.native.flag_query(grp).map_err(error::from_flags)
    }

    /// Waits for flags (`osEventFlagsWait`). Returns the requested flags that were set when the
    /// wait was satisfied.
    pub fn event_flags_wait(
        &self,
        id: &ObjectId,
        flags: u32,
        options: FlagsOptions,
        timeout: u32,
    ) -> Result<u32> {
        let grp = id.as_event_flags()?.handle()?;
        let flags = check_flags(flags)?;
        if may_block(timeout) {
            self.check_isr()?;
        }

        let (ticks, _) = pend_args(timeout);
        self.inner
            .native
            .flag_pend(grp, flags, ticks, options.pend_opt(timeout))
            .map_err(error::from_flags)
    }

    /// Deletes an event flag group (`osEventFlagsDelete`). Tasks waiting on it are woken with
    /// an error.
    pub fn event_flags_delete(&self, id: &ObjectId) -> Result<()> {
        let control = id.as_event_flags()?;
        self.check_isr()?;

        let grp = control.native.lock().take().ok_or(Error::Parameter)?;
        let deleted = self.inner.native.flag_del(grp);
        id.release_cb();
        deleted.map_err(|err| match error::from_delete(err) {
            Error::Parameter => Error::Parameter,
            _ => Error::Resource,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_map_to_pend_options() {
        assert_eq!(
            FlagsOptions::empty().pend_opt(10),
            PendOpt::FLAG_SET_ANY | PendOpt::FLAG_CONSUME
        );
        assert_eq!(
            (FlagsOptions::WAIT_ALL | FlagsOptions::NO_CLEAR).pend_opt(0),
            PendOpt::FLAG_SET_ALL | PendOpt::NON_BLOCKING
        );
    }

    #[test]
    fn raw_options_are_validated() {
        assert_eq!(FlagsOptions::from_raw(3), Ok(FlagsOptions::all()));
        assert_eq!(FlagsOptions::from_raw(4), Err(Error::Parameter));
    }

    #[test]
    fn flags_must_fit_the_mask() {
        assert_eq!(check_flags(0), Err(Error::Parameter));
        assert_eq!(check_flags(0x8000_0000), Err(Error::Parameter));
        assert_eq!(check_flags(FLAGS_MASK), Ok(FLAGS_MASK));
    }
}
