//! Counting semaphores.

use rtos2_native::{NativeKernel, SemHandle};
use spin::Mutex as SpinMutex;

use crate::{
    attr::SemaphoreAttr,
    error::{self, Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId, ObjectKind},
    timeout::{may_block, pend_args},
};

const SEM_NAME: &str = "cmsis.sem";

pub(crate) struct SemaphoreControl {
    max: u32,
    /// `None` once deleted.
    native: SpinMutex<Option<SemHandle>>,
}

impl SemaphoreControl {
    pub fn new(sem: SemHandle, max: u32) -> Self {
        Self {
            max,
            native: SpinMutex::new(Some(sem)),
        }
    }

    fn handle(&self) -> Result<SemHandle> {
        self.native.lock().ok_or(Error::Parameter)
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Creates a semaphore (`osSemaphoreNew`). Returns `None` on any failure.
    pub fn semaphore_new(
        &self,
        max_count: u32,
        initial_count: u32,
        attr: SemaphoreAttr,
    ) -> Option<ObjectId> {
        self.semaphore_try_new(max_count, initial_count, attr)
            .inspect_err(|err| log::debug!("semaphore creation failed: {err}"))
            .ok()
    }

    /// Creates a semaphore holding `initial_count` of at most `max_count` tokens.
    pub fn semaphore_try_new(
        &self,
        max_count: u32,
        initial_count: u32,
        attr: SemaphoreAttr,
    ) -> Result<ObjectId> {
        self.check_isr()?;
        if max_count == 0 || initial_count > max_count {
            return Err(Error::Parameter);
        }

        let header = Header::new(attr.name, attr.attr_bits, attr.cb_mem)?;
        let sem = self
            .inner
            .native
            .sem_create(attr.name.unwrap_or(SEM_NAME), initial_count)
            .map_err(|err| {
                log::debug!("native semaphore creation failed: {err}");
                Error::Resource
            })?;

        Ok(ObjectId::new(
            header,
            Body::Semaphore(SemaphoreControl::new(sem, max_count)),
        ))
    }

    pub fn semaphore_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::Semaphore)
    }

    /// Takes a token (`osSemaphoreAcquire`). From interrupt context only a zero timeout is
    /// allowed.
    pub fn semaphore_acquire(&self, id: &ObjectId, timeout: u32) -> Result<()> {
        let sem = id.as_semaphore()?.handle()?;
        if may_block(timeout) {
            self.check_isr()?;
        }

        let (ticks, opt) = pend_args(timeout);
        self.inner
            .native
            .sem_pend(sem, ticks, opt)
            .map(drop)
            .map_err(error::from_sync)
    }

    /// Returns a token (`osSemaphoreRelease`). Fails with [`Error::Resource`] if the semaphore
    /// already holds its maximum count.
    pub fn semaphore_release(&self, id: &ObjectId) -> Result<()> {
        let control = id.as_semaphore()?;
        let sem = control.handle()?;

        // Two concurrent releases may both pass the check and overshoot the maximum by one.
        let native = &self.inner.native;
        if native.sem_count(sem).map_err(error::from_sync)? >= control.max {
            return Err(Error::Resource);
        }
        native.sem_post(sem).map(drop).map_err(error::from_sync)
    }

    /// Returns the number of available tokens, or 0 on error (`osSemaphoreGetCount`).
    pub fn semaphore_count(&self, id: &ObjectId) -> u32 {
        id.as_semaphore()
            .and_then(SemaphoreControl::handle)
            .ok()
            .and_then(|sem| self.inner.native.sem_count(sem).ok())
            .unwrap_or(0)
    }

    /// Deletes a semaphore (`osSemaphoreDelete`). Tasks waiting on it are woken with an error.
    pub fn semaphore_delete(&self, id: &ObjectId) -> Result<()> {
        let control = id.as_semaphore()?;
        self.check_isr()?;

        let sem = control.native.lock().take().ok_or(Error::Parameter)?;
        let deleted = self.inner.native.sem_del(sem);
        id.release_cb();
        deleted.map_err(error::from_delete)
    }
}
