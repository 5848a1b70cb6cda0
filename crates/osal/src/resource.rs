//! Process-wide accounting of live primitives.
//!
//! Every successful create increments the count, every successful delete
//! decrements it, so at any moment it equals creates minus deletes over all
//! primitive kinds. A non-zero value at the end of a test run is a leak; a
//! negative one is a double delete.

use portable_atomic::{AtomicI32, Ordering};

/// An atomic live-object counter, safe to touch from interrupt context.
#[derive(Debug)]
pub struct ResourceCounter {
    count: AtomicI32,
}

impl ResourceCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
        }
    }

    #[inline]
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Current number of live primitives.
    #[inline]
    pub fn current(&self) -> i32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for ResourceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The counter every [`crate::Os`] uses unless built with another one.
/// Starts at zero and is never reset.
pub static RESOURCES: ResourceCounter = ResourceCounter::new();

/// Number of primitives currently allocated through the process-wide counter.
pub fn resource_alloc_count() -> i32 {
    RESOURCES.current()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_at_zero_and_tracks_balance() {
        let counter = ResourceCounter::new();
        assert_eq!(counter.current(), 0);

        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.current(), 1);

        counter.decrement();
        counter.decrement();
        assert_eq!(counter.current(), -1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let counter = Arc::new(ResourceCounter::new());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                    }
                    if i % 2 == 0 {
                        for _ in 0..500 {
                            counter.decrement();
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(counter.current(), 8 * 1000 - 4 * 500);
    }
}
