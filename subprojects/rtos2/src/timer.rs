//! Software timers.
//!
//! Callbacks run on the native timer service task.

use alloc::sync::Arc;

use rtos2_native::{NativeKernel, TmrHandle, TmrState};
use spin::Mutex as SpinMutex;

use crate::{
    attr::TimerAttr,
    error::{Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId, ObjectKind},
};

const TIMER_NAME: &str = "cmsis.timer";

/// Timer behavior (`osTimerType_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// Fires once per start.
    Once = 0,
    /// Fires every period until stopped.
    Periodic = 1,
}

pub(crate) struct TimerControl {
    kind: TimerType,
    /// `None` once deleted.
    native: SpinMutex<Option<TmrHandle>>,
}

impl TimerControl {
    fn handle(&self) -> Result<TmrHandle> {
        self.native.lock().ok_or(Error::Parameter)
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Creates a stopped timer (`osTimerNew`). Returns `None` on any failure.
    pub fn timer_new(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
        kind: TimerType,
        attr: TimerAttr,
    ) -> Option<ObjectId> {
        self.timer_try_new(callback, kind, attr)
            .inspect_err(|err| log::debug!("timer creation failed: {err}"))
            .ok()
    }

    pub fn timer_try_new(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
        kind: TimerType,
        attr: TimerAttr,
    ) -> Result<ObjectId> {
        self.check_isr()?;

        let header = Header::new(attr.name, attr.attr_bits, attr.cb_mem)?;
        let tmr = self
            .inner
            .native
            .tmr_create(attr.name.unwrap_or(TIMER_NAME), Arc::new(callback))
            .map_err(|err| {
                log::debug!("native timer creation failed: {err}");
                Error::Resource
            })?;

        Ok(ObjectId::new(
            header,
            Body::Timer(TimerControl {
                kind,
                native: SpinMutex::new(Some(tmr)),
            }),
        ))
    }

    pub fn timer_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::Timer)
    }

    /// Starts or restarts a timer to expire after `ticks` (`osTimerStart`). A periodic timer
    /// reloads with the same period.
    pub fn timer_start(&self, id: &ObjectId, ticks: u32) -> Result<()> {
        let timer = id.as_timer()?;
        self.check_isr()?;
        if ticks == 0 {
            return Err(Error::Parameter);
        }
        let tmr = timer.handle()?;

        let period = match timer.kind {
            TimerType::Once => 0,
            TimerType::Periodic => ticks,
        };
        let native = &self.inner.native;
        native
            .tmr_set(tmr, ticks, period)
            .and_then(|()| native.tmr_start(tmr))
            .map_err(|err| {
                log::debug!("failed to start {id:?}: {err}");
                Error::Resource
            })
    }

    /// Stops a running timer (`osTimerStop`).
    pub fn timer_stop(&self, id: &ObjectId) -> Result<()> {
        let timer = id.as_timer()?;
        self.check_isr()?;
        let tmr = timer.handle()?;

        self.inner
            .native
            .tmr_stop(tmr)
            .map_err(|_| Error::Resource)
    }

    /// Returns `true` if a timer is counting down (`osTimerIsRunning`).
    pub fn timer_is_running(&self, id: &ObjectId) -> bool {
        id.as_timer()
            .and_then(TimerControl::handle)
            .ok()
            .and_then(|tmr| self.inner.native.tmr_state(tmr).ok())
            == Some(TmrState::Running)
    }

    /// Deletes a timer (`osTimerDelete`).
    pub fn timer_delete(&self, id: &ObjectId) -> Result<()> {
        let timer = id.as_timer()?;
        self.check_isr()?;

        let tmr = timer.native.lock().take().ok_or(Error::Parameter)?;
        let deleted = self.inner.native.tmr_del(tmr);
        id.release_cb();
        deleted.map_err(|_| Error::Resource)
    }
}
