//! Message queues of pointer-sized messages.
//!
//! The native queue only stores messages. Admission is gated by a counting semaphore that
//! starts at the queue's capacity: a put takes a token before posting and a get returns one
//! after receiving, so a full queue blocks (or times out) in the put.

use rtos2_native::{NativeKernel, QueueHandle, SemHandle};
use spin::Mutex as SpinMutex;
use static_assertions::const_assert_eq;

use crate::{
    attr::MessageQueueAttr,
    error::{self, Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId, ObjectKind},
    storage::Backing,
    timeout::{may_block, pend_args},
};

const MQ_NAME: &str = "cmsis.mq";
const SPACE_SEM_NAME: &str = "cmsis.mq.space";

/// The only supported message size.
pub const MSG_SIZE: usize = size_of::<usize>();

// Messages travel through the native queue as a pointer-sized word.
const_assert_eq!(MSG_SIZE, size_of::<*const ()>());

pub(crate) struct MessageQueueControl {
    capacity: u32,
    native: SpinMutex<Option<Native>>,
    /// Caller-supplied message storage, kept until the queue is deleted.
    mem: SpinMutex<Option<Backing<u8>>>,
}

#[derive(Clone, Copy)]
struct Native {
    queue: QueueHandle,
    space: SemHandle,
}

impl MessageQueueControl {
    fn handles(&self) -> Result<Native> {
        (*self.native.lock()).ok_or(Error::Parameter)
    }
}

impl<K: NativeKernel> Kernel<K> {
    /// Creates a message queue (`osMessageQueueNew`). Returns `None` on any failure.
    pub fn message_queue_new(
        &self,
        msg_count: u32,
        msg_size: usize,
        attr: MessageQueueAttr,
    ) -> Option<ObjectId> {
        self.message_queue_try_new(msg_count, msg_size, attr)
            .inspect_err(|err| log::debug!("message queue creation failed: {err}"))
            .ok()
    }

    /// Creates a queue of `msg_count` messages. `msg_size` must be [`MSG_SIZE`].
    pub fn message_queue_try_new(
        &self,
        msg_count: u32,
        msg_size: usize,
        attr: MessageQueueAttr,
    ) -> Result<ObjectId> {
        self.check_isr()?;
        if msg_count == 0 || msg_size != MSG_SIZE {
            return Err(Error::Parameter);
        }
        let mem = match attr.mq_mem {
            Some(mem) if mem.len() < msg_count as usize * msg_size => {
                return Err(Error::Parameter);
            }
            mem => mem.map(Backing::Borrowed),
        };

        let header = Header::new(attr.name, attr.attr_bits, attr.cb_mem)?;
        let native = &self.inner.native;
        let queue = native
            .q_create(attr.name.unwrap_or(MQ_NAME), msg_count)
            .map_err(|err| {
                log::debug!("native queue creation failed: {err}");
                Error::Resource
            })?;
        let space = match native.sem_create(SPACE_SEM_NAME, msg_count) {
            Ok(space) => space,
            Err(err) => {
                log::debug!("space semaphore creation failed: {err}");
                if let Err(err) = native.q_del(queue) {
                    log::warn!("failed to delete a native queue: {err}");
                }
                return Err(Error::Resource);
            }
        };

        Ok(ObjectId::new(
            header,
            Body::MessageQueue(MessageQueueControl {
                capacity: msg_count,
                native: SpinMutex::new(Some(Native { queue, space })),
                mem: SpinMutex::new(mem),
            }),
        ))
    }

    pub fn message_queue_name(&self, id: &ObjectId) -> Option<&'static str> {
        id.name_of(ObjectKind::MessageQueue)
    }

    /// Appends a message (`osMessageQueuePut`). The priority is accepted and ignored: messages
    /// are delivered in FIFO order.
    pub fn message_queue_put(
        &self,
        id: &ObjectId,
        msg: usize,
        _prio: u8,
        timeout: u32,
    ) -> Result<()> {
        let Native { queue, space } = id.as_message_queue()?.handles()?;
        if may_block(timeout) {
            self.check_isr()?;
        }

        let native = &self.inner.native;
        let (ticks, opt) = pend_args(timeout);
        native
            .sem_pend(space, ticks, opt)
            .map_err(error::from_sync)?;

        native.q_post(queue, msg).map_err(|err| {
            if let Err(err) = native.sem_post(space) {
                log::warn!("failed to return a slot of {id:?}: {err}");
            }
            error::from_sync(err)
        })
    }

    /// Removes the oldest message (`osMessageQueueGet`).
    pub fn message_queue_get(&self, id: &ObjectId, timeout: u32) -> Result<usize> {
        let Native { queue, space } = id.as_message_queue()?.handles()?;
        if may_block(timeout) {
            self.check_isr()?;
        }

        let native = &self.inner.native;
        let (ticks, opt) = pend_args(timeout);
        let msg = native
            .q_pend(queue, ticks, opt)
            .map_err(error::from_sync)?;

        if let Err(err) = native.sem_post(space) {
            log::warn!("failed to free a slot of {id:?}: {err}");
        }
        Ok(msg)
    }

    /// Returns the capacity in messages, or 0 if `id` is not a queue.
    pub fn message_queue_capacity(&self, id: &ObjectId) -> u32 {
        id.as_message_queue().map_or(0, |mq| mq.capacity)
    }

    /// Returns the message size, or 0 if `id` is not a queue.
    pub fn message_queue_msg_size(&self, id: &ObjectId) -> usize {
        id.as_message_queue().map_or(0, |_| MSG_SIZE)
    }

    /// Returns the number of queued messages, or 0 on error.
    pub fn message_queue_count(&self, id: &ObjectId) -> u32 {
        id.as_message_queue()
            .and_then(MessageQueueControl::handles)
            .ok()
            .and_then(|native| self.inner.native.q_count(native.queue).ok())
            .unwrap_or(0)
    }

    /// Returns the number of free slots, or 0 on error.
    pub fn message_queue_space(&self, id: &ObjectId) -> u32 {
        id.as_message_queue()
            .and_then(MessageQueueControl::handles)
            .ok()
            .and_then(|native| self.inner.native.sem_count(native.space).ok())
            .unwrap_or(0)
    }

    /// Drops all queued messages (`osMessageQueueReset`).
    pub fn message_queue_reset(&self, id: &ObjectId) -> Result<()> {
        let mq = id.as_message_queue()?;
        self.check_isr()?;
        let Native { queue, space } = mq.handles()?;

        let native = &self.inner.native;
        let flushed = native.q_flush(queue).map_err(error::from_sync)?;
        log::trace!("flushed {flushed} messages from {id:?}");
        native
            .sem_set(space, mq.capacity)
            .map_err(|_| Error::Resource)
    }

    /// Deletes a queue (`osMessageQueueDelete`). Tasks waiting on it are woken with an error.
    pub fn message_queue_delete(&self, id: &ObjectId) -> Result<()> {
        let mq = id.as_message_queue()?;
        self.check_isr()?;

        let Native { queue, space } = mq.native.lock().take().ok_or(Error::Parameter)?;
        let native = &self.inner.native;
        if let Err(err) = native.q_del(queue) {
            *mq.native.lock() = Some(Native { queue, space });
            return Err(error::from_delete(err));
        }
        if let Err(err) = native.sem_del(space) {
            log::warn!("failed to delete the space semaphore of {id:?}: {err}");
        }

        if let Some(mem) = mq.mem.lock().take() {
            mem.release();
        }
        id.release_cb();
        Ok(())
    }
}
