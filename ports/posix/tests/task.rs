mod common;

use std::sync::mpsc;
use std::time::{Duration, Instant};

use common::{os, os_with, wait_for, PRIORITY, STACK};
use osal::{OsConfig, OsError};

#[test]
fn task_runs_with_its_captured_parameter() {
    let os = os();
    let (tx, rx) = mpsc::channel();
    let parameter = 42u32;

    let task_os = os.clone();
    let task = os
        .task_create(
            move || {
                let me = task_os.task_current();
                let is_me = me.map(|me| task_os.is_current_task(Some(me)));
                tx.send((parameter, me, is_me)).unwrap();
                task_os.task_delete(None).unwrap();
            },
            "worker",
            STACK,
            PRIORITY,
        )
        .unwrap();

    let (seen, me, is_me) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(seen, 42);
    assert_eq!(me, Ok(task));
    assert_eq!(is_me, Ok(true));

    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 0));
}

#[test]
fn kernel_records_name_stack_and_priority() {
    let os = os();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let task_os = os.clone();
    let task = os
        .task_create(
            move || {
                let _ = release_rx.recv();
                task_os.task_delete(None).unwrap();
            },
            "recorded",
            4096,
            7,
        )
        .unwrap();

    let info = os.kernel().task_info(task.raw()).unwrap();
    assert_eq!(info.name, "recorded");
    assert_eq!(info.stack_size, 4096);
    assert_eq!(info.priority, 7);
    assert_eq!(os.task_stack_min_free(Some(task)), Ok(4096));

    release_tx.send(()).unwrap();
    assert!(wait_for(Duration::from_secs(2), || os.kernel().task_info(task.raw()).is_none()));
    assert_eq!(os.task_stack_min_free(Some(task)), Err(OsError::InvalidParameter));
}

#[test]
fn priorities_outside_the_configured_range_are_invalid() {
    let os = os();
    let config = os.config().clone();
    for priority in [config.priority_min - 1, config.priority_max + 1] {
        assert_eq!(
            os.task_create(|| {}, "bad", STACK, priority),
            Err(OsError::InvalidParameter)
        );
    }
    assert_eq!(os.resource_alloc_count(), 0);
    assert_eq!(os.kernel().task_count(), 0);
}

#[test]
fn custom_priority_range_is_honoured() {
    let os = os_with(OsConfig::builder().priority_range(10, 20).build());
    assert_eq!(
        os.task_create(|| {}, "low", STACK, 5),
        Err(OsError::InvalidParameter)
    );

    let (tx, rx) = mpsc::channel();
    let task_os = os.clone();
    os.task_create(
        move || {
            tx.send(()).unwrap();
            task_os.task_delete(None).unwrap();
        },
        "high",
        STACK,
        20,
    )
    .unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 0));
}

#[test]
fn only_self_deletion_is_supported() {
    let os = os();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let task_os = os.clone();
    let task = os
        .task_create(
            move || {
                let _ = release_rx.recv();
                task_os.task_delete(None).unwrap();
            },
            "victim",
            STACK,
            PRIORITY,
        )
        .unwrap();

    assert_eq!(os.task_delete(Some(task)), Err(OsError::InvalidParameter));
    assert_eq!(os.resource_alloc_count(), 1);

    release_tx.send(()).unwrap();
    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 0));
}

#[test]
fn foreign_threads_are_not_tasks() {
    let os = os();
    assert!(os.is_current_task(None));
    assert_eq!(os.task_current(), Err(OsError::InvalidParameter));
    assert_eq!(os.task_delete(None), Err(OsError::InvalidParameter));
    assert_eq!(os.task_stack_min_free(None), Err(OsError::InvalidParameter));
    assert_eq!(os.resource_alloc_count(), 0);
}

#[test]
fn block_sleeps_for_at_least_the_delay() {
    let os = os();
    let started = Instant::now();
    os.task_block(25);
    assert!(started.elapsed() >= Duration::from_millis(25));
}

#[test]
fn task_returning_without_delete_is_cleaned_up_by_the_kernel() {
    let os = os();
    let task = os.task_create(|| {}, "careless", STACK, PRIORITY).unwrap();

    assert!(wait_for(Duration::from_secs(2), || os.kernel().task_info(task.raw()).is_none()));
    // Never deleted through the layer, so still counted.
    assert_eq!(os.resource_alloc_count(), 1);
}

#[test]
fn failed_spawn_leaves_the_creator_intact() {
    let os = os();
    let (tx, rx) = mpsc::channel();

    let task_os = os.clone();
    let parent = os
        .task_create(
            move || {
                let before = task_os.task_current();
                // No host can map a 64 TiB stack.
                let huge = task_os.task_create(|| {}, "huge", 1 << 46, PRIORITY);
                let after = task_os.task_current();
                let deleted = task_os.task_delete(None);
                tx.send((before, huge.is_err(), after, deleted)).unwrap();
            },
            "parent",
            STACK,
            PRIORITY,
        )
        .unwrap();

    let (before, huge_failed, after, deleted) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(huge_failed);
    assert_eq!(before, Ok(parent));
    assert_eq!(after, Ok(parent));
    assert_eq!(deleted, Ok(()));
    assert!(wait_for(Duration::from_secs(2), || os.resource_alloc_count() == 0));
    assert!(wait_for(Duration::from_secs(2), || os.kernel().task_count() == 0));
}
