//! Timer service thread.
//!
//! One thread per kernel sleeps until the earliest armed deadline and runs
//! the expiry hooks that are due, outside the state lock. Periodic timers
//! are re-armed from their previous deadline, not from "now", so they do not
//! drift; periods missed while the service was held up are skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use osal::{KernelError, KernelResult, RawHandle, TimerExpiry};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::table::next_handle;

const TARGET: &str = "osal_posix::timer";
const SERVICE_NAME: &str = "osal-timers";

struct Slot {
    period: Duration,
    auto_reload: bool,
    expiry: TimerExpiry,
    deadline: Option<Instant>,
}

#[derive(Default)]
struct ServiceState {
    timers: HashMap<RawHandle, Slot>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<ServiceState>,
    wake: Condvar,
}

pub(crate) struct TimerService {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerService {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            thread: Mutex::new(None),
        }
    }

    /// Starts the service thread on first use.
    fn ensure_running(&self) -> KernelResult<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(SERVICE_NAME.into())
            .spawn(move || run(&shared))
            .map_err(|err| {
                log::error!(target: TARGET, "timer service thread not spawned: {err}");
                KernelError::NoMemory
            })?;
        *thread = Some(spawned);
        Ok(())
    }

    fn with_slot<R>(
        &self,
        timer: RawHandle,
        f: impl FnOnce(&mut Slot) -> R,
    ) -> KernelResult<R> {
        let mut state = self.shared.state.lock();
        let slot = state
            .timers
            .get_mut(&timer)
            .ok_or(KernelError::UnknownHandle)?;
        let result = f(slot);
        drop(state);
        self.shared.wake.notify_one();
        Ok(result)
    }

    pub(crate) fn create(
        &self,
        name: Option<&str>,
        period: Duration,
        auto_reload: bool,
        expiry: TimerExpiry,
    ) -> KernelResult<RawHandle> {
        if period.is_zero() {
            return Err(KernelError::Rejected("zero timer period"));
        }
        self.ensure_running()?;
        let handle = next_handle()?;
        self.shared.state.lock().timers.insert(
            handle,
            Slot {
                period,
                auto_reload,
                expiry,
                deadline: None,
            },
        );
        log::trace!(
            target: TARGET,
            "timer {handle} \"{}\" created, period {period:?}",
            name.unwrap_or_default()
        );
        Ok(handle)
    }

    pub(crate) fn delete(&self, timer: RawHandle) -> KernelResult<()> {
        self.shared
            .state
            .lock()
            .timers
            .remove(&timer)
            .ok_or(KernelError::UnknownHandle)?;
        self.shared.wake.notify_one();
        Ok(())
    }

    pub(crate) fn start(&self, timer: RawHandle) -> KernelResult<()> {
        self.with_slot(timer, |slot| {
            slot.deadline = Some(Instant::now() + slot.period);
        })
    }

    pub(crate) fn stop(&self, timer: RawHandle) -> KernelResult<()> {
        self.with_slot(timer, |slot| slot.deadline = None)
    }

    /// Sets a new period and (re)starts the timer with it.
    pub(crate) fn change_period(&self, timer: RawHandle, period: Duration) -> KernelResult<()> {
        if period.is_zero() {
            return Err(KernelError::Rejected("zero timer period"));
        }
        self.with_slot(timer, |slot| {
            slot.period = period;
            slot.deadline = Some(Instant::now() + period);
        })
    }

    pub(crate) fn is_active(&self, timer: RawHandle) -> KernelResult<bool> {
        self.with_slot(timer, |slot| slot.deadline.is_some())
    }

    /// Stops the service thread and drops every timer.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.timers.clear();
        }
        self.shared.wake.notify_all();

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        // The last kernel reference may be released by an expiry hook.
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            log::error!(target: TARGET, "timer service thread panicked");
        }
    }
}

/// Collects the hooks of every due timer and re-arms periodic ones.
fn collect_due(state: &mut ServiceState, now: Instant, due: &mut Vec<(RawHandle, TimerExpiry)>) {
    for (handle, slot) in state.timers.iter_mut() {
        let Some(deadline) = slot.deadline else {
            continue;
        };
        if deadline > now {
            continue;
        }
        due.push((*handle, Arc::clone(&slot.expiry)));
        slot.deadline = if slot.auto_reload {
            let mut next = deadline + slot.period;
            while next <= now {
                next += slot.period;
            }
            Some(next)
        } else {
            None
        };
    }
}

fn run(shared: &Shared) {
    let mut due = Vec::new();
    let mut state = shared.state.lock();
    while !state.shutdown {
        collect_due(&mut state, Instant::now(), &mut due);
        if !due.is_empty() {
            MutexGuard::unlocked(&mut state, || {
                for (handle, expiry) in due.drain(..) {
                    expiry(handle);
                }
            });
            continue;
        }

        let earliest = state.timers.values().filter_map(|slot| slot.deadline).min();
        match earliest {
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
            None => shared.wake.wait(&mut state),
        }
    }
}
