//! Timer manager.
//!
//! Creation and deletion go through a [`TimerBackend`], which owns the
//! mapping from kernel expiries to user callbacks. Start, stop and interval
//! changes are plain kernel commands.

use alloc::sync::Arc;

use crate::error::{OsError, OsResult};
use crate::kernel::{Kernel, TimerHandle, Wait};
use crate::os::Os;
use crate::trace::Primitive;

/// Callback run on every expiry of a timer, in task context.
pub type TimerCallback = Arc<dyn Fn(TimerHandle) + Send + Sync + 'static>;

/// Platform-private half of the timer manager.
///
/// A back-end decides where callbacks run; [`crate::PrivateTimers`] runs them
/// on a dispatcher task fed by an event queue.
pub trait TimerBackend<K: Kernel>: Send + Sync {
    /// Allocates whatever the back-end needs; a second call is a no-op.
    fn init(&self, os: &Os<K>) -> OsResult<()>;

    /// Releases what `init` allocated; a second call is a no-op.
    fn deinit(&self, os: &Os<K>);

    /// Creates a dormant timer and registers its callback.
    fn create(
        &self,
        os: &Os<K>,
        name: Option<&str>,
        callback: TimerCallback,
        interval_ms: u32,
        periodic: bool,
    ) -> OsResult<TimerHandle>;

    /// Deletes the timer and unregisters its callback.
    fn delete(&self, os: &Os<K>, timer: TimerHandle) -> OsResult<()>;
}

impl<K: Kernel> Os<K> {
    /// Creates a stopped timer calling `callback` every `interval_ms`
    /// (`periodic`) or once after it is started.
    pub fn timer_create<F>(
        &self,
        name: Option<&str>,
        callback: F,
        interval_ms: u32,
        periodic: bool,
    ) -> OsResult<TimerHandle>
    where
        F: Fn(TimerHandle) + Send + Sync + 'static,
    {
        let timer = self
            .inner
            .timers
            .create(self, name, Arc::new(callback), interval_ms, periodic)?;

        self.account_create(
            Primitive::Timer,
            timer.raw(),
            format_args!(
                "\"{}\", {interval_ms} ms, {}",
                name.unwrap_or(""),
                if periodic { "periodic" } else { "one-shot" }
            ),
        );
        Ok(timer)
    }

    pub fn timer_delete(&self, timer: TimerHandle) -> OsResult<()> {
        self.inner.timers.delete(self, timer)?;
        self.account_delete(Primitive::Timer, Some(timer.raw()));
        Ok(())
    }

    pub fn timer_start(&self, timer: TimerHandle) -> OsResult<()> {
        self.kernel()
            .timer_start(timer.raw(), Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    pub fn timer_stop(&self, timer: TimerHandle) -> OsResult<()> {
        self.kernel()
            .timer_stop(timer.raw(), Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// Changes the interval, starting the timer if it was stopped.
    ///
    /// An interval shorter than one tick is refused with
    /// [`OsError::Platform`].
    pub fn timer_change_interval(&self, timer: TimerHandle, interval_ms: u32) -> OsResult<()> {
        let ticks = interval_ms / self.tick_period_ms().max(1);
        if ticks == 0 {
            return Err(OsError::Platform);
        }
        self.kernel()
            .timer_change_period(timer.raw(), ticks, Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }
}
