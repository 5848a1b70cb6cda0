//! Runtime configuration of the layer.
//!
//! The defaults mirror a typical Cortex-M4 FreeRTOS build: priorities 1..=15,
//! a 1 ms yield and a timer event task a few levels below the top priority.

/// Lowest task priority accepted by [`crate::Os::task_create`].
pub const DEFAULT_PRIORITY_MIN: u8 = 1;
/// Highest task priority accepted by [`crate::Os::task_create`].
pub const DEFAULT_PRIORITY_MAX: u8 = 15;
/// Time a polling loop gives away between attempts.
pub const DEFAULT_YIELD_MS: u32 = 1;
/// Depth of the queue carrying timer expiries to the dispatcher task.
pub const DEFAULT_TIMER_EVENT_QUEUE_SIZE: usize = 20;
/// Stack reserved for the timer dispatcher task.
pub const DEFAULT_TIMER_EVENT_TASK_STACK_SIZE: usize = 1536;

/// Configuration for an [`crate::Os`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsConfig {
    pub priority_min: u8,
    pub priority_max: u8,
    pub yield_ms: u32,
    /// Replace the blocking queue send with a poll-and-log retry loop.
    pub queue_debug: bool,
    pub timer_event_queue_size: usize,
    pub timer_event_task_stack_size: usize,
    pub timer_event_task_priority: u8,
}

impl Default for OsConfig {
    fn default() -> Self {
        Self {
            priority_min: DEFAULT_PRIORITY_MIN,
            priority_max: DEFAULT_PRIORITY_MAX,
            yield_ms: DEFAULT_YIELD_MS,
            queue_debug: cfg!(feature = "queue-debug"),
            timer_event_queue_size: DEFAULT_TIMER_EVENT_QUEUE_SIZE,
            timer_event_task_stack_size: DEFAULT_TIMER_EVENT_TASK_STACK_SIZE,
            timer_event_task_priority: DEFAULT_PRIORITY_MAX - 5,
        }
    }
}

impl OsConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OsConfigBuilder {
        OsConfigBuilder::default()
    }

    /// Returns true if `priority` lies within the configured range.
    pub fn priority_in_range(&self, priority: u8) -> bool {
        (self.priority_min..=self.priority_max).contains(&priority)
    }

    /// Number of polling attempts that add up to roughly one second.
    pub(crate) fn attempts_per_second(&self) -> u32 {
        (1000 / self.yield_ms.max(1)).max(1)
    }
}

/// Builder for ergonomic configuration construction.
#[derive(Debug, Clone, Default)]
pub struct OsConfigBuilder {
    config: OsConfig,
}

impl OsConfigBuilder {
    /// Sets the inclusive task priority range.
    pub fn priority_range(mut self, min: u8, max: u8) -> Self {
        self.config.priority_min = min;
        self.config.priority_max = max;
        self
    }

    /// Sets the yield interval used by polling loops.
    pub fn yield_ms(mut self, ms: u32) -> Self {
        self.config.yield_ms = ms;
        self
    }

    /// Enables or disables the poll-and-log queue send.
    pub fn queue_debug(mut self, enabled: bool) -> Self {
        self.config.queue_debug = enabled;
        self
    }

    /// Sets the depth of the timer event queue.
    pub fn timer_event_queue_size(mut self, size: usize) -> Self {
        self.config.timer_event_queue_size = size;
        self
    }

    /// Sets stack size and priority of the timer dispatcher task.
    pub fn timer_event_task(mut self, stack_size: usize, priority: u8) -> Self {
        self.config.timer_event_task_stack_size = stack_size;
        self.config.timer_event_task_priority = priority;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_range_is_inclusive() {
        let config = OsConfig::default();
        assert!(!config.priority_in_range(0));
        assert!(config.priority_in_range(1));
        assert!(config.priority_in_range(15));
        assert!(!config.priority_in_range(16));
    }

    #[test]
    fn attempts_per_second_never_zero() {
        let config = OsConfig::builder().yield_ms(0).build();
        assert_eq!(config.attempts_per_second(), 1000);

        let config = OsConfig::builder().yield_ms(5000).build();
        assert_eq!(config.attempts_per_second(), 1);

        let config = OsConfig::builder().yield_ms(10).build();
        assert_eq!(config.attempts_per_second(), 100);
    }
}
