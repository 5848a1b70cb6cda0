mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use common::{os, wait_for, PRIORITY, STACK};
use osal::OsError;

#[test]
fn lock_excludes_other_tasks() {
    let os = os();
    let mutex = os.mutex_create().unwrap();
    let shared = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::channel();

    for name in ["first", "second"] {
        let task_os = os.clone();
        let shared = Arc::clone(&shared);
        let tx = tx.clone();
        os.task_create(
            move || {
                for _ in 0..50 {
                    task_os.mutex_lock(mutex).unwrap();
                    // Non-atomic read-modify-write; only the mutex keeps it whole.
                    let value = shared.load(Ordering::Relaxed);
                    thread::yield_now();
                    shared.store(value + 1, Ordering::Relaxed);
                    task_os.mutex_unlock(mutex).unwrap();
                }
                tx.send(()).unwrap();
                task_os.task_delete(None).unwrap();
            },
            name,
            STACK,
            PRIORITY,
        )
        .unwrap();
    }

    for _ in 0..2 {
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    assert_eq!(shared.load(Ordering::Relaxed), 100);

    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 1));
    os.mutex_delete(mutex).unwrap();
    assert_eq!(os.resource_alloc_count(), 0);
}

#[test]
fn try_lock_on_a_held_mutex_times_out() {
    let os = os();
    let mutex = os.mutex_create().unwrap();
    os.mutex_lock(mutex).unwrap();

    let (tx, rx) = mpsc::channel();
    let task_os = os.clone();
    os.task_create(
        move || {
            tx.send(task_os.mutex_try_lock(mutex, 20)).unwrap();
            task_os.task_delete(None).unwrap();
        },
        "contender",
        STACK,
        PRIORITY,
    )
    .unwrap();

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Err(OsError::Timeout)
    );
    os.mutex_unlock(mutex).unwrap();
    assert_eq!(os.mutex_try_lock(mutex, 0), Ok(()));
    os.mutex_unlock(mutex).unwrap();

    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 1));
    os.mutex_delete(mutex).unwrap();
}

#[test]
fn unlocking_a_mutex_not_held_is_not_reported() {
    let os = os();
    let mutex = os.mutex_create().unwrap();
    assert_eq!(os.mutex_unlock(mutex), Ok(()));
    assert_eq!(os.kernel().semaphore_count(mutex.raw()), Ok(1));
    os.mutex_delete(mutex).unwrap();
}

#[test]
fn deleted_mutex_handle_is_invalid() {
    let os = os();
    let mutex = os.mutex_create().unwrap();
    assert_eq!(os.resource_alloc_count(), 1);
    os.mutex_delete(mutex).unwrap();
    assert_eq!(os.resource_alloc_count(), 0);

    assert_eq!(os.mutex_lock(mutex), Err(OsError::InvalidParameter));
    assert_eq!(os.mutex_unlock(mutex), Err(OsError::InvalidParameter));
    assert_eq!(os.mutex_delete(mutex), Err(OsError::InvalidParameter));
}

#[test]
fn mutex_handles_work_as_semaphores_in_the_kernel() {
    let os = os();
    let mutex = os.mutex_create().unwrap();
    os.mutex_lock(mutex).unwrap();
    assert_eq!(os.kernel().semaphore_count(mutex.raw()), Ok(0));
    os.mutex_unlock(mutex).unwrap();
    os.mutex_delete(mutex).unwrap();
}

#[cfg(feature = "mutex-debug")]
#[test]
fn debug_build_tracks_the_owner() {
    let os = os();
    let mutex = os.mutex_create().unwrap();

    os.mutex_lock(mutex).unwrap();
    let info = os.mutexes().info(mutex).unwrap();
    assert_eq!(info.owner.unwrap().thread, thread::current().id());
    assert!(info.locked_at.unwrap().file().ends_with("mutex.rs"));

    os.mutex_unlock(mutex).unwrap();
    assert!(os.mutexes().info(mutex).unwrap().owner.is_none());
    os.mutex_delete(mutex).unwrap();
    assert!(os.mutexes().info(mutex).is_none());
}
