//! Default timer back-end.
//!
//! Kernel timer expiries run in the kernel's timer service context, where
//! user code must not block. The expiry hook therefore only posts the timer
//! handle to an event queue; a dispatcher task drains that queue, looks the
//! callback up in the registry and runs it.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::mem;

use parking_lot::Mutex;

use crate::error::{KernelError, OsError, OsResult};
use crate::kernel::{Kernel, QueueHandle, RawHandle, TaskHandle, TimerExpiry, TimerHandle, Wait};
use crate::os::{Os, WeakOs};
use crate::timer::{TimerBackend, TimerCallback};

const TARGET: &str = "osal::timer";

/// Bytes of one event queue item: a raw handle, zero meaning "stop".
const EVENT_SIZE: usize = mem::size_of::<usize>();
const STOP: usize = 0;

/// Longest timer name kept, in bytes.
pub const TIMER_NAME_MAX: usize = 15;

const DISPATCHER_NAME: &str = "timerEvent";

/// Longest the dispatcher waits for an event before checking its `Os`.
const POLL_MS: u32 = 100;

type TimerName = heapless::String<16>;

struct Entry {
    handle: TimerHandle,
    name: TimerName,
    callback: TimerCallback,
}

type Registry = Arc<Mutex<Vec<Entry>>>;

#[derive(Clone, Copy)]
struct Running {
    events: QueueHandle,
    dispatcher: TaskHandle,
}

/// Timer back-end running callbacks on a dedicated dispatcher task.
pub struct PrivateTimers<K: Kernel> {
    running: Mutex<Option<Running>>,
    registry: Registry,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: Kernel> PrivateTimers<K> {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(None),
            registry: Arc::new(Mutex::new(Vec::new())),
            _kernel: PhantomData,
        }
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered name of `timer`, truncated to [`TIMER_NAME_MAX`] bytes.
    pub fn name_of(&self, timer: TimerHandle) -> Option<TimerName> {
        self.registry
            .lock()
            .iter()
            .find(|entry| entry.handle == timer)
            .map(|entry| entry.name.clone())
    }
}

impl<K: Kernel> Default for PrivateTimers<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `name` up to [`TIMER_NAME_MAX`] bytes, never splitting a character.
fn truncate_name(name: Option<&str>) -> TimerName {
    let mut out = TimerName::new();
    for ch in name.unwrap_or_default().chars() {
        if out.len() + ch.len_utf8() > TIMER_NAME_MAX || out.push(ch).is_err() {
            break;
        }
    }
    out
}

fn dispatch<K: Kernel>(weak: WeakOs<K>, events: QueueHandle, registry: Registry) {
    let mut buf = [0u8; EVENT_SIZE];
    // Upgraded once per wait so an `Os` dropped without `deinit` still
    // releases its kernel.
    let os = loop {
        let Some(os) = weak.upgrade() else {
            log::debug!(target: TARGET, "timer dispatcher exits, its Os is gone");
            return;
        };
        match os.queue_try_receive(events, POLL_MS, &mut buf) {
            Ok(()) => {}
            Err(OsError::Timeout) => continue,
            Err(err) => {
                log::error!(target: TARGET, "timer event queue {events} failed: {err}");
                break os;
            }
        }
        let Some(raw) = RawHandle::new(usize::from_ne_bytes(buf)) else {
            break os;
        };
        let timer = TimerHandle::from_raw(raw);

        let callback = registry
            .lock()
            .iter()
            .find(|entry| entry.handle == timer)
            .map(|entry| Arc::clone(&entry.callback));

        // Called unlocked so the callback may use the timer API itself.
        match callback {
            Some(callback) => callback(timer),
            None => log::debug!(target: TARGET, "expiry of deleted timer {timer} dropped"),
        }
    };

    if let Err(err) = os.task_delete(None) {
        log::error!(target: TARGET, "timer dispatcher could not delete itself: {err}");
    }
}

impl<K: Kernel> TimerBackend<K> for PrivateTimers<K> {
    fn init(&self, os: &Os<K>) -> OsResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let config = os.config();
        let events = os
            .queue_create(config.timer_event_queue_size, EVENT_SIZE)
            .map_err(|_| OsError::Platform)?;

        let dispatcher_os = os.downgrade();
        let registry = Arc::clone(&self.registry);
        let dispatcher = os.task_create(
            move || dispatch(dispatcher_os, events, registry),
            DISPATCHER_NAME,
            config.timer_event_task_stack_size,
            config.timer_event_task_priority,
        );
        let dispatcher = match dispatcher {
            Ok(task) => task,
            Err(err) => {
                if let Err(cleanup) = os.queue_delete(events) {
                    log::error!(target: TARGET, "timer event queue {events} leaked: {cleanup}");
                }
                return Err(err);
            }
        };

        *running = Some(Running { events, dispatcher });
        Ok(())
    }

    fn deinit(&self, os: &Os<K>) {
        // Checked and cleared under one lock so only one caller tears down.
        let Running { events, dispatcher } = {
            let mut running = self.running.lock();
            let Some(current) = *running else {
                return;
            };
            if os.is_current_task(Some(current.dispatcher)) {
                log::error!(target: TARGET, "deinit from a timer callback ignored");
                return;
            }
            *running = None;
            current
        };

        let leftovers = mem::take(&mut *self.registry.lock());
        for entry in leftovers {
            log::warn!(
                target: TARGET,
                "timer {} \"{}\" still exists at deinit, removing it",
                entry.handle,
                entry.name
            );
            let raw = entry.handle.raw();
            if let Err(err) = os
                .kernel()
                .timer_stop(raw, Wait::Forever)
                .and_then(|()| os.kernel().timer_delete(raw, Wait::Forever))
            {
                log::error!(target: TARGET, "timer {} not removed: {err}", entry.handle);
            }
        }

        if let Err(err) = os.queue_send(events, &STOP.to_ne_bytes()) {
            log::error!(target: TARGET, "timer dispatcher could not be stopped: {err}");
            return;
        }
        while os.kernel().task_exists(dispatcher.raw()) {
            os.task_block(os.config().yield_ms);
        }
        if let Err(err) = os.queue_delete(events) {
            log::error!(target: TARGET, "timer event queue {events} leaked: {err}");
        }
    }

    fn create(
        &self,
        os: &Os<K>,
        name: Option<&str>,
        callback: TimerCallback,
        interval_ms: u32,
        periodic: bool,
    ) -> OsResult<TimerHandle> {
        let events = self
            .running
            .lock()
            .map(|running| running.events)
            .ok_or(OsError::NotInitialised)?;
        if interval_ms == 0 {
            return Err(OsError::InvalidParameter);
        }

        let kernel = Arc::downgrade(&os.inner.kernel);
        let expiry: TimerExpiry = Arc::new(move |timer: RawHandle| {
            let Some(kernel) = kernel.upgrade() else {
                return;
            };
            if let Err(err) = kernel.queue_send_from_isr(events.raw(), &timer.get().to_ne_bytes()) {
                log::warn!(target: TARGET, "expiry of timer {timer} lost: {err}");
            }
        });

        let ticks = interval_ms / os.tick_period_ms().max(1);
        let raw = os
            .kernel()
            .timer_create(name, ticks, periodic, expiry)
            .map_err(|err| match err {
                KernelError::NoMemory => OsError::NoMemory,
                other => other.to_os(OsError::Platform),
            })?;

        let handle = TimerHandle::from_raw(raw);
        self.registry.lock().push(Entry {
            handle,
            name: truncate_name(name),
            callback,
        });
        Ok(handle)
    }

    fn delete(&self, os: &Os<K>, timer: TimerHandle) -> OsResult<()> {
        os.kernel()
            .timer_delete(timer.raw(), Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))?;
        self.registry.lock().retain(|entry| entry.handle != timer);
        Ok(())
    }
}
