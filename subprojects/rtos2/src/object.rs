//! Identity-tagged objects.
//!
//! Every handle the layer gives out is an [`ObjectId`]: a reference-counted record with a common
//! [`Header`] (name, creation attributes, control-block storage) and a kind-specific body. The
//! kind is checked before any kind-specific access, so a semaphore id passed to a mutex call is
//! rejected with [`Error::Parameter`] without reaching the native kernel.

use alloc::sync::Arc;
use core::{fmt, hash};

use spin::Mutex as SpinMutex;

use crate::{
    error::{Error, Result},
    event_flags::EventFlagsControl,
    message_queue::MessageQueueControl,
    mutex::MutexControl,
    semaphore::SemaphoreControl,
    storage::Backing,
    thread::ThreadControl,
    timer::TimerControl,
};

/// The kind of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Thread,
    Mutex,
    Semaphore,
    EventFlags,
    Timer,
    MessageQueue,
}

/// An opaque handle to a thread, mutex, semaphore, event flag group, timer or message queue.
///
/// Cloning an id yields another reference to the same object. Two ids compare equal only if
/// they refer to the same object.
#[derive(Clone)]
pub struct ObjectId(Arc<Object>);

pub(crate) struct Object {
    header: Header,
    body: Body,
}

/// Common part of every object.
pub(crate) struct Header {
    name: Option<&'static str>,
    attr_bits: u32,
    cb: SpinMutex<Option<Backing<u8>>>,
}

pub(crate) enum Body {
    Thread(ThreadControl),
    Mutex(MutexControl),
    Semaphore(SemaphoreControl),
    EventFlags(EventFlagsControl),
    Timer(TimerControl),
    MessageQueue(MessageQueueControl),
}

impl Header {
    /// Creates a header, validating caller-supplied control-block storage.
    pub fn new(
        name: Option<&'static str>,
        attr_bits: u32,
        cb_mem: Option<&'static mut [u8]>,
    ) -> Result<Self> {
        let cb = match cb_mem {
            Some(mem) if mem.len() < ObjectId::CB_SIZE => return Err(Error::Parameter),
            Some(mem) => {
                mem.fill(0);
                Some(Backing::Borrowed(mem))
            }
            None => None,
        };

        Ok(Self {
            name,
            attr_bits,
            cb: SpinMutex::new(cb),
        })
    }
}

impl ObjectId {
    /// Minimum size of caller-supplied control-block storage (`cb_size`).
    pub const CB_SIZE: usize = size_of::<Object>();

    pub(crate) fn new(header: Header, body: Body) -> Self {
        Self(Arc::new(Object { header, body }))
    }

    /// Returns the kind of the object.
    pub fn kind(&self) -> ObjectKind {
        match self.0.body {
            Body::Thread(_) => ObjectKind::Thread,
            Body::Mutex(_) => ObjectKind::Mutex,
            Body::Semaphore(_) => ObjectKind::Semaphore,
            Body::EventFlags(_) => ObjectKind::EventFlags,
            Body::Timer(_) => ObjectKind::Timer,
            Body::MessageQueue(_) => ObjectKind::MessageQueue,
        }
    }

    /// Returns the name given at creation.
    pub fn name(&self) -> Option<&'static str> {
        self.0.header.name
    }

    /// Returns the attribute bits given at creation.
    pub fn attr_bits(&self) -> u32 {
        self.0.header.attr_bits
    }

    /// Returns the name if the object is of the given kind.
    pub(crate) fn name_of(&self, kind: ObjectKind) -> Option<&'static str> {
        (self.kind() == kind).then(|| self.name()).flatten()
    }

    /// Returns caller-supplied control-block storage to its owner.
    pub(crate) fn release_cb(&self) {
        if let Some(cb) = self.0.header.cb.lock().take() {
            cb.release();
        }
    }

    pub(crate) fn as_thread(&self) -> Result<&ThreadControl> {
        match &self.0.body {
            Body::Thread(thread) => Ok(thread),
            _ => Err(Error::Parameter),
        }
    }

    pub(crate) fn as_mutex(&self) -> Result<&MutexControl> {
        match &self.0.body {
            Body::Mutex(mutex) => Ok(mutex),
            _ => Err(Error::Parameter),
        }
    }

    pub(crate) fn as_semaphore(&self) -> Result<&SemaphoreControl> {
        match &self.0.body {
            Body::Semaphore(sem) => Ok(sem),
            _ => Err(Error::Parameter),
        }
    }

    pub(crate) fn as_event_flags(&self) -> Result<&EventFlagsControl> {
        match &self.0.body {
            Body::EventFlags(flags) => Ok(flags),
            _ => Err(Error::Parameter),
        }
    }

    pub(crate) fn as_timer(&self) -> Result<&TimerControl> {
        match &self.0.body {
            Body::Timer(timer) => Ok(timer),
            _ => Err(Error::Parameter),
        }
    }

    pub(crate) fn as_message_queue(&self) -> Result<&MessageQueueControl> {
        match &self.0.body {
            Body::MessageQueue(mq) => Ok(mq),
            _ => Err(Error::Parameter),
        }
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObjectId {}

impl hash::Hash for ObjectId {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectId")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("addr", &Arc::as_ptr(&self.0))
            .finish()
    }
}
