//! Thread creation.

use alloc::boxed::Box;

use rtos2_native::{NativeKernel, NativePrio, TaskHandle, TaskSpec};

use super::{Mode, Remains, Teardown, ThreadControl, ThreadInner, ThreadState};
use crate::{
    attr::{ThreadAttr, ThreadAttrBits},
    error::{Error, Result},
    kernel::Kernel,
    object::{Body, Header, ObjectId},
    storage::{Backing, StackWord},
};

/// Native name of a thread created without one.
const TASK_NAME: &str = "cmsis.task";

/// Native name of join semaphores.
const JOIN_SEM_NAME: &str = "cmsis.join";

impl<K: NativeKernel> Kernel<K> {
    /// Creates and starts a thread (`osThreadNew`). Returns `None` on any failure.
    pub fn thread_new(
        &self,
        entry: impl FnOnce() + Send + 'static,
        attr: ThreadAttr,
    ) -> Option<ObjectId> {
        self.thread_try_new(entry, attr)
            .inspect_err(|err| log::debug!("thread creation failed: {err}"))
            .ok()
    }

    /// Creates and starts a thread.
    ///
    /// The thread gets the most urgent free native priority at or above the one its level
    /// encodes to. Creation fails with [`Error::Resource`] if no such priority is free.
    pub fn thread_try_new(
        &self,
        entry: impl FnOnce() + Send + 'static,
        attr: ThreadAttr,
    ) -> Result<ObjectId> {
        self.check_isr()?;
        if !self.is_initialized() {
            return Err(Error::Unknown);
        }

        let ThreadAttr {
            name,
            attr_bits,
            cb_mem,
            stack_mem,
            stack_size,
            priority,
        } = attr;
        let priority = priority.unwrap_or_default();
        let mode = if attr_bits.contains(ThreadAttrBits::JOINABLE) {
            Mode::Joinable
        } else {
            Mode::Detached
        };

        let mut stack = self.thread_stack(stack_mem, stack_size)?;
        let header = Header::new(name, attr_bits.bits(), cb_mem)?;
        let join_sem = match mode {
            Mode::Joinable => Some(self.inner.native.sem_create(JOIN_SEM_NAME, 0).map_err(
                |err| {
                    log::debug!("failed to create a join semaphore: {err}");
                    Error::Resource
                },
            )?),
            Mode::Detached => None,
        };

        let stack_base = stack.base();
        let stack_bytes = stack.len() * size_of::<StackWord>();
        let id = ObjectId::new(
            header,
            Body::Thread(ThreadControl::new(
                Box::new(entry),
                stack_bytes,
                ThreadInner::new(priority, mode, join_sem, stack),
            )),
        );
        let thread = id.as_thread()?;

        let Some(native_prio) = self.register_thread(&id, thread) else {
            log::debug!("no free native priority for {priority:?}");
            self.unwind_create(&id, thread);
            return Err(Error::Resource);
        };

        let kernel = self.clone();
        let me = id.clone();
        let spec = TaskSpec {
            name: name.unwrap_or(TASK_NAME),
            prio: native_prio,
            stack_base,
            stack_size: stack_bytes,
            entry: Box::new(move || kernel.thread_trampoline(me)),
        };

        match self.inner.native.task_create(spec) {
            Ok(task) => {
                self.bind_task(thread, task);
                log::debug!("created {id:?} ({priority:?} at native {native_prio})");
                Ok(id)
            }
            Err(err) => {
                log::debug!("native task creation failed: {err}");
                self.unwind_create(&id, thread);
                Err(Error::Resource)
            }
        }
    }

    /// Sizes and validates the stack of a new thread.
    fn thread_stack(
        &self,
        stack_mem: Option<&'static mut [StackWord]>,
        stack_size: usize,
    ) -> Result<Backing<StackWord>> {
        let config = &self.inner.config;
        let word = size_of::<StackWord>();

        match stack_mem {
            Some(mem) => {
                let bytes = match stack_size {
                    0 => mem.len() * word,
                    bytes => bytes,
                };
                let words = bytes.div_ceil(word).max(config.min_stack_words);
                if mem.len() < words {
                    return Err(Error::Parameter);
                }
                Ok(Backing::Borrowed(mem))
            }
            None => {
                let bytes = match stack_size {
                    0 => config.default_stack_size,
                    bytes => bytes,
                };
                Ok(Backing::alloc(
                    bytes.div_ceil(word).max(config.min_stack_words),
                ))
            }
        }
    }

    /// Allocates a native priority and links the thread into the registry.
    fn register_thread(
        &self,
        id: &ObjectId,
        thread: &ThreadControl,
    ) -> Option<NativePrio> {
        let native = &self.inner.native;
        let mut inner = thread.inner.lock();
        let mut registry = self.inner.registry.lock();

        let native_prio = self.inner.band.allocate(inner.priority, |p| {
            registry.prio_taken(p, None) || native.prio_in_use(p)
        })?;
        inner.native_prio = native_prio;
        inner.node = Some(registry.insert(id.clone(), native_prio));
        Some(native_prio)
    }

    /// Records the native task of a thread, unless it is already known or torn down.
    pub(super) fn bind_task(&self, thread: &ThreadControl, task: TaskHandle) {
        let mut inner = thread.inner.lock();
        if inner.teardown.is_some() || inner.task.is_some() {
            return;
        }

        inner.task = Some(task);
        if let Some(node) = inner.node {
            // SAFETY: `node` is present, so it is linked in this kernel's registry.
            unsafe { self.inner.registry.lock().bind(node, task) };
        }
    }

    /// Releases everything a failed creation acquired.
    fn unwind_create(&self, id: &ObjectId, thread: &ThreadControl) {
        let (unlinked, remains) = {
            let mut inner = thread.inner.lock();
            inner.teardown = Some(Teardown::Terminated);
            inner.state = ThreadState::Terminated;
            let unlinked = inner.node.take().and_then(|node| {
                // SAFETY: The node was returned by `insert` and is taken out exactly once.
                unsafe { self.inner.registry.lock().remove(node) }
            });
            let remains = Remains {
                join_sem: inner.join_sem.take(),
                stack: inner.stack.take(),
            };
            (unlinked, remains)
        };

        let entry = thread.entry.lock().take();
        drop(entry);
        drop(unlinked);
        self.release_remains(id, remains);
    }
}
