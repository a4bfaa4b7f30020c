//! Control-block and stack storage.
//!
//! Storage is either allocated by the layer or supplied by the caller through an attribute.
//! [`Backing`] records which, so that releasing it never frees caller memory.

use alloc::{boxed::Box, vec};
use core::ptr::NonNull;

/// Native stack element (`CPU_STK`).
pub type StackWord = u32;

/// A block of storage and its ownership.
#[derive(Debug)]
pub(crate) enum Backing<T: 'static> {
    /// Allocated by the layer; freed on release.
    Owned(Box<[T]>),
    /// Supplied by the caller; never freed by the layer.
    Borrowed(&'static mut [T]),
}

impl<T: Copy + Default + 'static> Backing<T> {
    /// Allocates `len` default-initialized elements.
    pub fn alloc(len: usize) -> Self {
        Self::Owned(vec![T::default(); len].into_boxed_slice())
    }
}

impl<T: 'static> Backing<T> {
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[cfg(test)]
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Owned(mem) => mem,
            Self::Borrowed(mem) => mem,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Self::Owned(mem) => mem,
            Self::Borrowed(mem) => mem,
        }
    }

    /// Returns the base address of the block.
    pub fn base(&mut self) -> NonNull<u8> {
        NonNull::from(self.as_mut_slice()).cast()
    }

    /// Gives the block up. Owned memory is freed; borrowed memory is left to its owner.
    pub fn release(self) {
        match self {
            Self::Owned(mem) => {
                log::trace!("freeing {} owned elements", mem.len());
                drop(mem);
            }
            Self::Borrowed(mem) => {
                log::trace!("returning {} borrowed elements", mem.len());
            }
        }
    }
}
