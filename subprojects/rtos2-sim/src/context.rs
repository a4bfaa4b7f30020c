//! Per-thread execution context.
//!
//! Every simulated task runs on its own host thread, so "which task is running" and "are we in
//! an interrupt handler" are both properties of the calling host thread.

use std::{cell::Cell, marker::PhantomData};

/// Identifies the simulated task bound to the calling host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskRef {
    /// Address of the owning kernel's shared state.
    pub kernel: usize,
    /// Slot of the task control block.
    pub key: usize,
    /// Creation serial of the task control block; tells a reused slot apart.
    pub serial: u64,
}

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskRef>> = const { Cell::new(None) };
    static ISR_NESTING: Cell<u32> = const { Cell::new(0) };
}

pub(crate) fn current_task() -> Option<TaskRef> {
    CURRENT_TASK.with(Cell::get)
}

pub(crate) fn set_current_task(task: Option<TaskRef>) {
    CURRENT_TASK.with(|cell| cell.set(task));
}

/// Returns `true` if the calling host thread is inside an [`IsrGuard`].
pub fn in_isr() -> bool {
    ISR_NESTING.with(Cell::get) > 0
}

/// Emulated interrupt context.
///
/// While a guard is alive, the calling host thread is treated as an interrupt handler
/// (`OSIntNestingCtr > 0`). Guards nest.
#[must_use = "the interrupt context ends when the guard is dropped"]
#[derive(Debug)]
pub struct IsrGuard {
    // Interrupt nesting is per host thread.
    _not_send: PhantomData<*const ()>,
}

impl IsrGuard {
    pub(crate) fn enter() -> Self {
        ISR_NESTING.with(|nesting| nesting.set(nesting.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        ISR_NESTING.with(|nesting| nesting.set(nesting.get() - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isr_guards_nest() {
        assert!(!in_isr());
        {
            let _outer = IsrGuard::enter();
            assert!(in_isr());
            {
                let _inner = IsrGuard::enter();
                assert!(in_isr());
            }
            assert!(in_isr());
        }
        assert!(!in_isr());
    }

    #[test]
    fn isr_context_is_per_thread() {
        let _guard = IsrGuard::enter();
        let other = std::thread::spawn(in_isr).join().unwrap();
        assert!(!other);
        assert!(in_isr());
    }
}
