//! Tick clock for the hosted kernel.
//!
//! Ticks are derived from a monotonic clock rather than counted by a ticker
//! thread, so they never drift and cost nothing while idle.

use std::time::{Duration, Instant};

use osal::Wait;

/// Default tick rate in Hz.
pub const DEFAULT_TICKS_PER_SEC: u32 = 1000;

/// Highest tick rate that still gives a whole-millisecond tick.
pub const MAX_TICKS_PER_SEC: u32 = 1000;

const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Monotonic tick source.
#[derive(Debug, Clone)]
pub struct TickClock {
    start: Instant,
    rate_hz: u32,
}

impl TickClock {
    /// `rate_hz` is clamped to `1..=MAX_TICKS_PER_SEC`.
    pub fn new(rate_hz: u32) -> Self {
        Self {
            start: Instant::now(),
            rate_hz: rate_hz.clamp(1, MAX_TICKS_PER_SEC),
        }
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Length of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(NSEC_PER_SEC / u64::from(self.rate_hz))
    }

    /// Tick period rounded down to whole milliseconds.
    pub fn period_ms(&self) -> u32 {
        1000 / self.rate_hz
    }

    /// Ticks elapsed since the clock was created.
    pub fn ticks(&self) -> u64 {
        let elapsed = self.start.elapsed().as_nanos();
        let period = self.period().as_nanos().max(1);
        u64::try_from(elapsed / period).unwrap_or(u64::MAX)
    }

    pub fn duration_of(&self, ticks: u32) -> Duration {
        self.period().saturating_mul(ticks)
    }

    /// Absolute deadline for `wait`, `None` for an unbounded wait.
    pub fn deadline(&self, wait: Wait) -> Option<Instant> {
        match wait {
            Wait::Forever => None,
            Wait::Ticks(ticks) => Some(Instant::now() + self.duration_of(ticks)),
        }
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_SEC)
    }
}
