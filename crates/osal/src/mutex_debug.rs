//! Bookkeeping decorator for mutexes.
//!
//! [`DebugMutexes`] sits in front of any [`MutexApi`] and records who holds
//! each mutex, where it was locked and for how long, and how many callers
//! are queued on it. Inputs, outputs and error codes are exactly those of the
//! wrapped implementation, so it can be slotted in at build time without
//! touching call sites.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::panic::Location;
use core::time::Duration;
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::OsResult;
use crate::kernel::MutexHandle;
use crate::mutex::MutexApi;

const TARGET: &str = "osal::mutex_debug";

/// The thread currently holding a mutex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub thread: ThreadId,
    pub name: Option<String>,
}

impl Owner {
    fn current() -> Self {
        let me = thread::current();
        Self {
            thread: me.id(),
            name: me.name().map(String::from),
        }
    }
}

/// State of one mutex as seen by the decorator.
#[derive(Debug, Clone)]
pub struct MutexInfo {
    pub handle: MutexHandle,
    pub owner: Option<Owner>,
    /// Call site of the lock that is currently held.
    pub locked_at: Option<&'static Location<'static>>,
    pub held_for: Option<Duration>,
    /// Callers blocked in `lock`/`try_lock` right now.
    pub waiting: usize,
    /// Successful locks since creation.
    pub lock_count: u64,
}

#[derive(Debug, Default)]
struct Record {
    owner: Option<Owner>,
    locked_at: Option<&'static Location<'static>>,
    since: Option<Instant>,
    waiting: usize,
    lock_count: u64,
}

impl Record {
    fn info(&self, handle: MutexHandle, now: Instant) -> MutexInfo {
        MutexInfo {
            handle,
            owner: self.owner.clone(),
            locked_at: self.locked_at,
            held_for: self.since.map(|since| now.saturating_duration_since(since)),
            waiting: self.waiting,
            lock_count: self.lock_count,
        }
    }
}

/// Mutex decorator that tracks ownership for deadlock hunting.
pub struct DebugMutexes<M: MutexApi> {
    inner: M,
    records: Mutex<BTreeMap<MutexHandle, Record>>,
}

impl<M: MutexApi> DebugMutexes<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// The wrapped implementation.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// State of every live mutex, ordered by handle.
    pub fn snapshot(&self) -> Vec<MutexInfo> {
        let now = Instant::now();
        self.records
            .lock()
            .iter()
            .map(|(handle, record)| record.info(*handle, now))
            .collect()
    }

    /// State of a single mutex, `None` if the decorator has never seen it.
    pub fn info(&self, mutex: MutexHandle) -> Option<MutexInfo> {
        let now = Instant::now();
        self.records.lock().get(&mutex).map(|record| record.info(mutex, now))
    }

    /// Mutexes held for longer than `limit`; each one is also logged as a
    /// warning.
    pub fn held_longer_than(&self, limit: Duration) -> Vec<MutexInfo> {
        let suspects: Vec<MutexInfo> = self
            .snapshot()
            .into_iter()
            .filter(|info| info.held_for.is_some_and(|held| held > limit))
            .collect();

        for info in &suspects {
            let held_ms = info.held_for.map_or(0, |held| held.as_millis());
            match info.locked_at {
                Some(at) => log::warn!(
                    target: TARGET,
                    "mutex {} held for {held_ms} ms by {:?}, locked at {at}, {} waiting",
                    info.handle,
                    info.owner,
                    info.waiting
                ),
                None => log::warn!(
                    target: TARGET,
                    "mutex {} held for {held_ms} ms by {:?}, {} waiting",
                    info.handle,
                    info.owner,
                    info.waiting
                ),
            }
        }
        suspects
    }

    fn enter_wait(&self, mutex: MutexHandle) {
        self.records.lock().entry(mutex).or_default().waiting += 1;
    }

    fn leave_wait(&self, mutex: MutexHandle, acquired: Option<&'static Location<'static>>) {
        let mut records = self.records.lock();
        let record = records.entry(mutex).or_default();
        record.waiting = record.waiting.saturating_sub(1);
        if let Some(at) = acquired {
            record.owner = Some(Owner::current());
            record.locked_at = Some(at);
            record.since = Some(Instant::now());
            record.lock_count += 1;
        }
    }
}

impl<M: MutexApi> MutexApi for DebugMutexes<M> {
    fn create(&self) -> OsResult<MutexHandle> {
        let mutex = self.inner.create()?;
        self.records.lock().insert(mutex, Record::default());
        Ok(mutex)
    }

    fn delete(&self, mutex: MutexHandle) -> OsResult<()> {
        if let Some(record) = self.records.lock().get(&mutex) {
            if record.owner.is_some() || record.waiting > 0 {
                log::warn!(
                    target: TARGET,
                    "mutex {mutex} deleted while held by {:?} with {} waiting",
                    record.owner,
                    record.waiting
                );
            }
        }
        self.inner.delete(mutex)?;
        self.records.lock().remove(&mutex);
        Ok(())
    }

    #[track_caller]
    fn lock(&self, mutex: MutexHandle) -> OsResult<()> {
        let at = Location::caller();
        self.enter_wait(mutex);
        let result = self.inner.lock(mutex);
        self.leave_wait(mutex, result.is_ok().then_some(at));
        result
    }

    #[track_caller]
    fn try_lock(&self, mutex: MutexHandle, wait_ms: u32) -> OsResult<()> {
        let at = Location::caller();
        self.enter_wait(mutex);
        let result = self.inner.try_lock(mutex, wait_ms);
        self.leave_wait(mutex, result.is_ok().then_some(at));
        result
    }

    fn unlock(&self, mutex: MutexHandle) -> OsResult<()> {
        self.inner.unlock(mutex)?;
        let me = thread::current().id();
        if let Some(record) = self.records.lock().get_mut(&mutex) {
            match &record.owner {
                Some(owner) if owner.thread != me => {
                    // The kernel refuses to release a mutex for a non-holder.
                    log::warn!(
                        target: TARGET,
                        "mutex {mutex} unlocked by {:?} while held by {owner:?}",
                        Owner::current()
                    );
                }
                _ => {
                    record.owner = None;
                    record.locked_at = None;
                    record.since = None;
                }
            }
        }
        Ok(())
    }
}
