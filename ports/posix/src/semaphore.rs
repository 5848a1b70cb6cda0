//! Counting semaphores and mutexes.
//!
//! A mutex is a binary semaphore that starts full and remembers which thread
//! took it; only that thread may give it back.

use std::thread::{self, ThreadId};
use std::time::Instant;

use osal::{KernelError, KernelResult};
use parking_lot::{Condvar, Mutex};

use crate::sync::wait_while;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counting,
    Mutex,
}

struct SemaphoreState {
    count: u32,
    owner: Option<ThreadId>,
    closed: bool,
    waiters: usize,
}

pub(crate) struct Semaphore {
    kind: Kind,
    limit: u32,
    state: Mutex<SemaphoreState>,
    available: Condvar,
}

impl Semaphore {
    pub(crate) fn counting(limit: u32, initial_count: u32) -> KernelResult<Self> {
        if limit == 0 || initial_count > limit {
            return Err(KernelError::Rejected("semaphore count out of range"));
        }
        Ok(Self::build(Kind::Counting, limit, initial_count))
    }

    pub(crate) fn mutex() -> Self {
        Self::build(Kind::Mutex, 1, 1)
    }

    fn build(kind: Kind, limit: u32, count: u32) -> Self {
        Self {
            kind,
            limit,
            state: Mutex::new(SemaphoreState {
                count,
                owner: None,
                closed: false,
                waiters: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub(crate) fn take(&self, deadline: Option<Instant>) -> KernelResult<()> {
        let mut state = self.state.lock();
        state.waiters += 1;
        let ready = wait_while(&self.available, &mut state, deadline, |s| {
            !s.closed && s.count == 0
        });
        state.waiters -= 1;

        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        if !ready {
            return Err(KernelError::Timeout);
        }
        state.count -= 1;
        if self.kind == Kind::Mutex {
            state.owner = Some(thread::current().id());
        }
        Ok(())
    }

    /// Gives one unit back; returns whether a waiter was woken.
    fn release(&self) -> KernelResult<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        if self.kind == Kind::Mutex {
            if state.owner != Some(thread::current().id()) {
                return Err(KernelError::Rejected("mutex not held by caller"));
            }
            state.owner = None;
        }
        if state.count >= self.limit {
            return Err(KernelError::Full);
        }
        state.count += 1;
        let woken = state.waiters > 0;
        drop(state);
        self.available.notify_one();
        Ok(woken)
    }

    pub(crate) fn give(&self) -> KernelResult<()> {
        self.release().map(drop)
    }

    pub(crate) fn give_from_isr(&self) -> KernelResult<bool> {
        if self.kind == Kind::Mutex {
            return Err(KernelError::Rejected("mutex given from interrupt context"));
        }
        self.release()
    }

    pub(crate) fn count(&self) -> u32 {
        self.state.lock().count
    }

    /// Wakes every blocked caller with [`KernelError::UnknownHandle`].
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn count_is_bounded_by_limit() {
        let semaphore = Semaphore::counting(2, 1).unwrap();
        semaphore.give().unwrap();
        assert_eq!(semaphore.give(), Err(KernelError::Full));
        assert_eq!(semaphore.count(), 2);

        semaphore.take(None).unwrap();
        semaphore.take(None).unwrap();
        assert_eq!(semaphore.take(Some(Instant::now())), Err(KernelError::Timeout));
        assert_eq!(semaphore.count(), 0);
    }

    #[test]
    fn bad_counts_are_rejected() {
        assert!(Semaphore::counting(0, 0).is_err());
        assert!(Semaphore::counting(1, 2).is_err());
    }

    #[test]
    fn only_the_owner_releases_a_mutex() {
        let mutex = Arc::new(Semaphore::mutex());
        mutex.take(None).unwrap();

        let stranger = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || mutex.give()).join().unwrap()
        };
        assert!(matches!(stranger, Err(KernelError::Rejected(_))));

        mutex.give().unwrap();
        assert_eq!(mutex.count(), 1);
    }

    #[test]
    fn mutex_cannot_be_given_from_isr() {
        let mutex = Semaphore::mutex();
        assert!(matches!(mutex.give_from_isr(), Err(KernelError::Rejected(_))));
    }
}
