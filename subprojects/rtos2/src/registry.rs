//! # Thread registry
//!
//! Tracks every live thread object of a kernel so that a native task handle (for example the
//! running task, or the owner of a mutex) can be resolved back to its [`ObjectId`].
//!
//! ## Design at a glance
//!
//! • **Storage** – Every entry is a heap-allocated `Box<Node>` that holds the intrusive
//!   [`LinkedListLink`], a strong reference to the thread object and two fields mirrored from
//!   the thread: its native task handle and its native priority. Mirroring them keeps lookups
//!   inside the registry lock, so that the registry never has to take a thread's own lock.
//!
//! • **Ownership** – [`Registry::insert`] hands out a [`NodeRef`], which the thread keeps until
//!   its teardown passes it back to [`Registry::remove`]. Because the thread gives up its
//!   `NodeRef` when removing, removal happens at most once; a thread that holds no `NodeRef`
//!   is not linked.
//!
//! • **Thread-safety** – The registry is not synchronized by itself. The kernel keeps it behind
//!   a spin lock and every access, including the mirrored fields, happens with that lock held.
//!
//! [`LinkedListLink`]: intrusive_collections::LinkedListLink

use alloc::boxed::Box;
use core::{cell::Cell, ptr::NonNull};

use intrusive_collections::{LinkedList, LinkedListLink, intrusive_adapter};
use rtos2_native::{NativePrio, TaskHandle};

use crate::object::ObjectId;

/// Intrusive list node of a registered thread.
pub(crate) struct Node {
    link: LinkedListLink,
    thread: ObjectId,
    task: Cell<Option<TaskHandle>>,
    prio: Cell<NativePrio>,
}

intrusive_adapter!(NodeAdapter = Box<Node>: Node { link: LinkedListLink });

/// A reference to a linked [`Node`], handed out by [`Registry::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeRef(NonNull<Node>);

// SAFETY: A `NodeRef` is only dereferenced by the registry, with the registry lock held.
unsafe impl Send for NodeRef {}
// SAFETY: See above.
unsafe impl Sync for NodeRef {}

/// Insertion-ordered list of live thread objects.
pub(crate) struct Registry {
    list: LinkedList<NodeAdapter>,
    len: usize,
}

// SAFETY: The nodes are owned by the list and only touched through `&mut Registry` or
// `&Registry`, both of which require the kernel's registry lock.
unsafe impl Send for Registry {}

impl Registry {
    pub fn new() -> Self {
        Self {
            list: LinkedList::new(NodeAdapter::new()),
            len: 0,
        }
    }

    /// Appends a thread at the tail.
    pub fn insert(&mut self, thread: ObjectId, prio: NativePrio) -> NodeRef {
        let node = Box::new(Node {
            link: LinkedListLink::new(),
            thread,
            task: Cell::new(None),
            prio: Cell::new(prio),
        });
        let ptr = NonNull::from(&*node);

        self.list.push_back(node);
        self.len += 1;
        NodeRef(ptr)
    }

    /// Unlinks a thread and returns the registry's reference to it.
    ///
    /// # Safety
    ///
    /// `node` must have been returned by [`insert`](Self::insert) on this registry and must not
    /// have been removed since.
    pub unsafe fn remove(&mut self, node: NodeRef) -> Option<ObjectId> {
        // SAFETY: The caller guarantees that the node is linked in this list.
        let mut cursor = unsafe { self.list.cursor_mut_from_ptr(node.0.as_ptr()) };
        let removed = cursor.remove()?;
        self.len -= 1;
        Some(removed.thread)
    }

    /// Records the native task of a registered thread.
    ///
    /// # Safety
    ///
    /// Same contract as [`remove`](Self::remove).
    pub unsafe fn bind(&mut self, node: NodeRef, task: TaskHandle) {
        // SAFETY: The node is linked, so it is alive; `&mut self` excludes other accessors.
        unsafe { node.0.as_ref() }.task.set(Some(task));
    }

    /// Updates the native priority mirrored in a registered thread.
    ///
    /// # Safety
    ///
    /// Same contract as [`remove`](Self::remove).
    pub unsafe fn set_prio(&mut self, node: NodeRef, prio: NativePrio) {
        // SAFETY: See `bind`.
        unsafe { node.0.as_ref() }.prio.set(prio);
    }

    /// Returns the first thread bound to `task`.
    pub fn find_by_native_handle(&self, task: TaskHandle) -> Option<ObjectId> {
        self.list
            .iter()
            .find(|node| node.task.get() == Some(task))
            .map(|node| node.thread.clone())
    }

    /// Returns `true` if a thread other than `except` holds the native priority.
    pub fn prio_taken(&self, prio: NativePrio, except: Option<NodeRef>) -> bool {
        self.list.iter().any(|node| {
            node.prio.get() == prio
                && except.is_none_or(|except| !core::ptr::eq(node, except.0.as_ptr()))
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Iterates over the registered threads in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.list.iter().map(|node| &node.thread)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::object::tests::dummy_object;

    fn task(raw: u32) -> TaskHandle {
        // SAFETY: Test handles are never passed to a kernel.
        unsafe { TaskHandle::from_raw(raw) }
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..4).map(|_| dummy_object()).collect();
        for (prio, id) in ids.iter().enumerate() {
            registry.insert(id.clone(), prio as NativePrio);
        }

        assert_eq!(registry.len(), 4);
        assert!(registry.iter().eq(ids.iter()));
    }

    #[test]
    fn remove_unlinks_in_the_middle() {
        let mut registry = Registry::new();
        let a = dummy_object();
        let b = dummy_object();
        let c = dummy_object();
        registry.insert(a.clone(), 1);
        let node_b = registry.insert(b.clone(), 2);
        registry.insert(c.clone(), 3);

        // SAFETY: `node_b` is linked.
        let removed = unsafe { registry.remove(node_b) };
        assert_eq!(removed.as_ref(), Some(&b));
        assert_eq!(registry.len(), 2);
        assert!(registry.iter().eq([&a, &c]));
        assert!(!registry.prio_taken(2, None));
    }

    #[test]
    fn find_by_native_handle_returns_first_match() {
        let mut registry = Registry::new();
        let a = dummy_object();
        let b = dummy_object();
        let node_a = registry.insert(a.clone(), 1);
        let node_b = registry.insert(b.clone(), 2);

        assert_eq!(registry.find_by_native_handle(task(7)), None);
        // SAFETY: Both nodes are linked.
        unsafe {
            registry.bind(node_a, task(7));
            registry.bind(node_b, task(8));
        }
        assert_eq!(registry.find_by_native_handle(task(7)), Some(a));
        assert_eq!(registry.find_by_native_handle(task(8)), Some(b));
    }

    #[test]
    fn prio_taken_ignores_the_excluded_node() {
        let mut registry = Registry::new();
        let node = registry.insert(dummy_object(), 30);

        assert!(registry.prio_taken(30, None));
        assert!(!registry.prio_taken(30, Some(node)));
        // SAFETY: `node` is linked.
        unsafe { registry.set_prio(node, 31) };
        assert!(registry.prio_taken(31, None));
        assert!(!registry.prio_taken(30, None));
    }
}
