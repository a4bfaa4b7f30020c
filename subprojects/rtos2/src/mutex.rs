//! Mutexes.
//!
//! A mutex is a native mutex, which provides ownership and priority inheritance. Recursive
//! locking is counted by the layer: the native mutex is taken once, on the outermost acquire,
//! and given back on the matching release.

use rtos2_native::{ErrorCode, MutexHandle, NativeKernel};
use spin::Mutex as SpinMutex;

use crate::{
    attr::{MutexAttr, MutexAttrBits},
    error::{self, Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId, ObjectKind},
    timeout::pend_args,
};

const MUTEX_NAME: &str = "cmsis.mutex";

pub(crate) struct MutexControl {
    recursive: bool,
    state: SpinMutex<MutexState>,
}

struct MutexState {
    /// `None` once deleted.
    native: Option<MutexHandle>,
    /// Recursive acquisitions by the owner, including the outermost one.
    depth: u32,
}

impl MutexControl {
    fn handle(&self) -> Result<MutexHandle> {
        self.state.lock().native.ok_or(Error::Parameter)
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Creates a mutex (`osMutexNew`). Returns `None` on any failure.
    pub fn mutex_new(&self, attr: MutexAttr) -> Option<ObjectId> {
        self.mutex_try_new(attr)
            .inspect_err(|err| log::debug!("mutex creation failed: {err}"))
            .ok()
    }

    /// Creates a mutex.
    ///
    /// [`MutexAttrBits::RECURSIVE`] is rejected with [`Error::Parameter`] unless the profile
    /// supports recursive mutexes.
    pub fn mutex_try_new(&self, attr: MutexAttr) -> Result<ObjectId> {
        self.check_isr()?;

        let recursive = attr.attr_bits.contains(MutexAttrBits::RECURSIVE);
        if recursive && !self.inner.profile.recursive_mutex() {
            return Err(Error::Parameter);
        }

        let header = Header::new(attr.name, attr.attr_bits.bits(), attr.cb_mem)?;
        let native = self
            .inner
            .native
            .mutex_create(attr.name.unwrap_or(MUTEX_NAME))
            .map_err(|err| {
                log::debug!("native mutex creation failed: {err}");
                Error::Resource
            })?;

        Ok(ObjectId::new(
            header,
            Body::Mutex(MutexControl {
                recursive,
                state: SpinMutex::new(MutexState {
                    native: Some(native),
                    depth: 0,
                }),
            }),
        ))
    }

    pub fn mutex_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::Mutex)
    }

    /// Acquires a mutex (`osMutexAcquire`).
    pub fn mutex_acquire(&self, id: &ObjectId, timeout: u32) -> Result<()> {
        let mutex = id.as_mutex()?;
        self.check_isr()?;
        let handle = mutex.handle()?;

        let (ticks, opt) = pend_args(timeout);
        match self.inner.native.mutex_pend(handle, ticks, opt) {
            Ok(()) => {
                if mutex.recursive {
                    mutex.state.lock().depth = 1;
                }
                Ok(())
            }
            Err(ErrorCode::MutexOwner) if mutex.recursive => {
                let mut state = mutex.state.lock();
                state.depth = state.depth.checked_add(1).ok_or(Error::Resource)?;
                Ok(())
            }
            Err(err) => Err(error::from_sync(err)),
        }
    }

    /// Releases a mutex (`osMutexRelease`).
    pub fn mutex_release(&self, id: &ObjectId) -> Result<()> {
        let mutex = id.as_mutex()?;
        self.check_isr()?;
        let handle = mutex.handle()?;

        if mutex.recursive {
            // Only the owner touches the depth.
            let native = &self.inner.native;
            let owner = native.mutex_owner(handle).map_err(error::from_sync)?;
            if owner != native.task_current() {
                return Err(Error::Resource);
            }

            let mut state = mutex.state.lock();
            if state.depth > 1 {
                state.depth -= 1;
                return Ok(());
            }
            state.depth = 0;
        }

        self.inner
            .native
            .mutex_post(handle)
            .map_err(error::from_sync)
    }

    /// Returns the thread owning a mutex (`osMutexGetOwner`). `None` if the mutex is free or
    /// owned by a task the layer did not create.
    pub fn mutex_owner(&self, id: &ObjectId) -> Option<ObjectId> {
        let handle = id.as_mutex().ok()?.handle().ok()?;
        let task = self.inner.native.mutex_owner(handle).ok()??;
        self.inner.registry.lock().find_by_native_handle(task)
    }

    /// Deletes a mutex (`osMutexDelete`). Tasks waiting on it are woken with an error.
    pub fn mutex_delete(&self, id: &ObjectId) -> Result<()> {
        let mutex = id.as_mutex()?;
        self.check_isr()?;

        let handle = {
            let mut state = mutex.state.lock();
            state.depth = 0;
            state.native.take().ok_or(Error::Parameter)?
        };
        let deleted = self.inner.native.mutex_del(handle);
        id.release_cb();
        deleted.map_err(error::from_delete)
    }
}
