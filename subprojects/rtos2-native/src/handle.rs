//! Handle types.
//!
//! A native kernel addresses its control blocks (`OS_TCB`, `OS_SEM`, ...) by pointer. Here each
//! kind of control block gets its own newtype around a [`RawHandle`] so that a semaphore handle
//! can never be passed where a task handle is expected.

use static_assertions::const_assert_eq;

/// The raw representation of a native object handle.
pub type RawHandle = u32;

/// Internal macro to generate [`RawHandle`] newtypes with common helpers.
macro_rules! define_handle_type {
    {
        $(#[$meta:meta])* $vis:vis struct $name:ident
    } => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name($crate::handle::RawHandle);

        impl $name {
            /// Converts a raw handle to a [`$name`].
            ///
            /// # Safety
            ///
            /// Caller must guarantee that the raw handle was issued by the native kernel for an
            /// object of this kind.
            pub const unsafe fn from_raw(raw: $crate::handle::RawHandle) -> Self {
                Self(raw)
            }

            /// Converts the [`$name`] to a raw handle.
            pub const fn to_raw(&self) -> $crate::handle::RawHandle {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_handle_type! {
    /// A handle to a native task control block (`OS_TCB`).
    pub struct TaskHandle
}

define_handle_type! {
    /// A handle to a native counting semaphore (`OS_SEM`).
    pub struct SemHandle
}

define_handle_type! {
    /// A handle to a native mutual exclusion semaphore (`OS_MUTEX`).
    pub struct MutexHandle
}

define_handle_type! {
    /// A handle to a native event flag group (`OS_FLAG_GRP`).
    pub struct FlagGrpHandle
}

define_handle_type! {
    /// A handle to a native message queue (`OS_Q`).
    pub struct QueueHandle
}

define_handle_type! {
    /// A handle to a native software timer (`OS_TMR`).
    pub struct TmrHandle
}

const_assert_eq!(size_of::<TaskHandle>(), size_of::<RawHandle>());
const_assert_eq!(size_of::<Option<TaskHandle>>(), 2 * size_of::<RawHandle>());
