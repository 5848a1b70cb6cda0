//! Simulated interrupt context.
//!
//! A host has no interrupts, so tests mark a stretch of code as running "in
//! an ISR" with [`simulate`]. While the mark is set the kernel refuses every
//! call that could block.

use std::cell::Cell;

thread_local! {
    static NESTING_LEVEL: Cell<usize> = const { Cell::new(0) };
}

/// RAII marker; interrupt context ends when the last guard drops.
pub struct IsrGuard {
    _not_send: core::marker::PhantomData<*const ()>,
}

impl IsrGuard {
    fn enter() -> Self {
        NESTING_LEVEL.with(|level| level.set(level.get() + 1));
        Self {
            _not_send: core::marker::PhantomData,
        }
    }
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        NESTING_LEVEL.with(|level| level.set(level.get().saturating_sub(1)));
    }
}

/// Marks the calling thread as being in interrupt context until the guard
/// drops. Nesting is allowed, as with real interrupt priorities.
pub fn enter_isr() -> IsrGuard {
    IsrGuard::enter()
}

/// Runs `f` in simulated interrupt context.
pub fn simulate<R>(f: impl FnOnce() -> R) -> R {
    let _isr = enter_isr();
    f()
}

/// True while the calling thread is in simulated interrupt context.
pub fn in_isr() -> bool {
    NESTING_LEVEL.with(Cell::get) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn simulate_sets_and_clears_the_mark() {
        assert!(!in_isr());
        let inside = simulate(in_isr);
        assert!(inside);
        assert!(!in_isr());
    }

    #[test]
    fn nested_interrupts_unwind_in_order() {
        let outer = enter_isr();
        {
            let _inner = enter_isr();
            assert!(in_isr());
        }
        assert!(in_isr());
        drop(outer);
        assert!(!in_isr());
    }

    #[test]
    fn mark_is_per_thread() {
        simulate(|| {
            let other = thread::spawn(in_isr).join().unwrap();
            assert!(!other);
        });
    }
}
