use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{OsError, OsResult};
use crate::kernel::{MutexHandle, RawHandle};
use crate::mutex::MutexApi;
use crate::mutex_debug::DebugMutexes;

/// Non-blocking stand-in: `lock` on a held mutex fails instead of waiting.
#[derive(Default)]
struct StubMutexes {
    next: Mutex<usize>,
    held: Mutex<BTreeMap<MutexHandle, bool>>,
}

impl MutexApi for StubMutexes {
    fn create(&self) -> OsResult<MutexHandle> {
        let mut next = self.next.lock();
        *next += 1;
        let handle = MutexHandle::from_raw(RawHandle::new(*next).ok_or(OsError::Platform)?);
        self.held.lock().insert(handle, false);
        Ok(handle)
    }

    fn delete(&self, mutex: MutexHandle) -> OsResult<()> {
        self.held
            .lock()
            .remove(&mutex)
            .map(drop)
            .ok_or(OsError::InvalidParameter)
    }

    fn lock(&self, mutex: MutexHandle) -> OsResult<()> {
        match self.held.lock().get_mut(&mutex) {
            None => Err(OsError::InvalidParameter),
            Some(held) if *held => Err(OsError::Platform),
            Some(held) => {
                *held = true;
                Ok(())
            }
        }
    }

    fn try_lock(&self, mutex: MutexHandle, _wait_ms: u32) -> OsResult<()> {
        self.lock(mutex).map_err(|err| match err {
            OsError::Platform => OsError::Timeout,
            other => other,
        })
    }

    fn unlock(&self, mutex: MutexHandle) -> OsResult<()> {
        match self.held.lock().get_mut(&mutex) {
            None => Err(OsError::InvalidParameter),
            Some(held) => {
                *held = false;
                Ok(())
            }
        }
    }
}

#[test]
fn records_owner_and_call_site() {
    let mutexes = DebugMutexes::new(StubMutexes::default());
    let mutex = mutexes.create().unwrap();

    let line = line!() + 1;
    mutexes.lock(mutex).unwrap();

    let info = mutexes.info(mutex).unwrap();
    let owner = info.owner.expect("owner recorded");
    assert_eq!(owner.thread, thread::current().id());
    let at = info.locked_at.expect("call site recorded");
    assert!(at.file().ends_with("mutex_debug.rs"));
    assert_eq!(at.line(), line);
    assert!(info.held_for.is_some());
    assert_eq!(info.lock_count, 1);
    assert_eq!(info.waiting, 0);

    mutexes.unlock(mutex).unwrap();
    let info = mutexes.info(mutex).unwrap();
    assert!(info.owner.is_none());
    assert!(info.locked_at.is_none());
    assert!(info.held_for.is_none());
}

#[test]
fn errors_pass_through_unchanged() {
    let mutexes = DebugMutexes::new(StubMutexes::default());
    let mutex = mutexes.create().unwrap();

    mutexes.try_lock(mutex, 10).unwrap();
    assert_eq!(mutexes.try_lock(mutex, 10), Err(OsError::Timeout));
    assert_eq!(mutexes.info(mutex).unwrap().lock_count, 1);

    let stale = MutexHandle::from_raw(RawHandle::new(999).unwrap());
    assert_eq!(mutexes.unlock(stale), Err(OsError::InvalidParameter));
    assert_eq!(mutexes.delete(stale), Err(OsError::InvalidParameter));
}

#[test]
fn failed_lock_leaves_no_waiter_behind() {
    let mutexes = DebugMutexes::new(StubMutexes::default());
    let mutex = mutexes.create().unwrap();
    mutexes.lock(mutex).unwrap();

    assert_eq!(mutexes.lock(mutex), Err(OsError::Platform));
    let info = mutexes.info(mutex).unwrap();
    assert_eq!(info.waiting, 0);
    assert_eq!(info.lock_count, 1);
}

#[test]
fn delete_forgets_the_mutex() {
    let mutexes = DebugMutexes::new(StubMutexes::default());
    let first = mutexes.create().unwrap();
    let second = mutexes.create().unwrap();
    assert_eq!(mutexes.snapshot().len(), 2);

    mutexes.delete(first).unwrap();
    let snapshot = mutexes.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].handle, second);
    assert!(mutexes.info(first).is_none());
}

#[test]
fn long_holds_are_reported() {
    let mutexes = DebugMutexes::new(StubMutexes::default());
    let held = mutexes.create().unwrap();
    let free = mutexes.create().unwrap();

    mutexes.lock(held).unwrap();
    thread::sleep(Duration::from_millis(20));

    let suspects = mutexes.held_longer_than(Duration::from_millis(5));
    assert_eq!(suspects.len(), 1);
    assert_eq!(suspects[0].handle, held);
    assert!(mutexes
        .held_longer_than(Duration::from_secs(60))
        .is_empty());
    assert!(mutexes.info(free).unwrap().owner.is_none());
}

#[test]
fn owner_is_the_locking_thread() {
    let mutexes = Arc::new(DebugMutexes::new(StubMutexes::default()));
    let mutex = mutexes.create().unwrap();

    let worker = {
        let mutexes = Arc::clone(&mutexes);
        thread::Builder::new()
            .name("locker".into())
            .spawn(move || {
                mutexes.lock(mutex).unwrap();
                thread::current().id()
            })
            .unwrap()
    };
    let locker = worker.join().unwrap();

    let owner = mutexes.info(mutex).unwrap().owner.unwrap();
    assert_eq!(owner.thread, locker);
    assert_eq!(owner.name.as_deref(), Some("locker"));
}

#[test]
fn unlock_by_another_thread_keeps_the_holder() {
    let mutexes = Arc::new(DebugMutexes::new(StubMutexes::default()));
    let mutex = mutexes.create().unwrap();
    mutexes.lock(mutex).unwrap();

    let stranger = {
        let mutexes = Arc::clone(&mutexes);
        thread::spawn(move || mutexes.unlock(mutex)).join().unwrap()
    };
    // Same result as the wrapped implementation.
    assert_eq!(stranger, Ok(()));

    let info = mutexes.info(mutex).unwrap();
    assert_eq!(info.owner.unwrap().thread, thread::current().id());
    assert!(info.locked_at.is_some());
    assert!(info.held_for.is_some());

    mutexes.unlock(mutex).unwrap();
    assert!(mutexes.info(mutex).unwrap().owner.is_none());
}
