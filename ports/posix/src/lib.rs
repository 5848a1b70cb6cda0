//! Hosted kernel for the osal abstraction layer.
//!
//! [`PosixKernel`] implements [`osal::Kernel`] on std threads so the layer
//! and everything built on it runs on a workstation:
//!
//! - tasks are named threads with (at least) the requested stack;
//! - queues and semaphores are `parking_lot` mutex/condvar pairs;
//! - timers run on one service thread per kernel;
//! - interrupt context is simulated per thread with [`interrupt::simulate`].
//!
//! Priorities are recorded but not enforced; the host scheduler decides who
//! runs. Handles come from one never-reused sequence, so stale handles are
//! always detected.

pub mod interrupt;
mod queue;
mod semaphore;
mod sync;
mod table;
mod task;
pub mod time;
mod timer;

use std::thread;

// Links the std `critical-section` implementation the accountant's atomics
// fall back on.
#[cfg(feature = "critical-section")]
use critical_section as _;

use osal::{Kernel, KernelResult, RawHandle, TaskParams, TimerExpiry, Wait};

use crate::queue::ByteQueue;
use crate::semaphore::Semaphore;
use crate::sync::task_context;
use crate::table::Table;
use crate::task::Tasks;
use crate::timer::TimerService;

pub use crate::task::{TaskInfo, MIN_HOST_STACK};
pub use crate::time::{TickClock, DEFAULT_TICKS_PER_SEC};

const TARGET: &str = "osal_posix";

/// Kernel running every task on its own std thread.
pub struct PosixKernel {
    clock: TickClock,
    tasks: Tasks,
    queues: Table<ByteQueue>,
    semaphores: Table<Semaphore>,
    timers: TimerService,
}

impl PosixKernel {
    /// Kernel ticking at [`DEFAULT_TICKS_PER_SEC`].
    pub fn new() -> Self {
        Self::with_tick_rate(DEFAULT_TICKS_PER_SEC)
    }

    /// Kernel ticking at `rate_hz`, clamped to `1..=1000`.
    pub fn with_tick_rate(rate_hz: u32) -> Self {
        Self {
            clock: TickClock::new(rate_hz),
            tasks: Tasks::new(),
            queues: Table::new(),
            semaphores: Table::new(),
            timers: TimerService::new(),
        }
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Name, stack and priority of a live task.
    pub fn task_info(&self, task: RawHandle) -> Option<TaskInfo> {
        self.tasks.record(task).ok().map(|info| (*info).clone())
    }

    /// Number of tasks created and not yet deleted.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Current count of a semaphore (1 for a free mutex, 0 for a held one).
    pub fn semaphore_count(&self, semaphore: RawHandle) -> KernelResult<u32> {
        Ok(self.semaphores.get(semaphore)?.count())
    }

    /// True while a timer is armed.
    pub fn timer_is_active(&self, timer: RawHandle) -> KernelResult<bool> {
        self.timers.is_active(timer)
    }
}

impl Default for PosixKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PosixKernel {
    fn drop(&mut self) {
        self.timers.shutdown();
        for (_, queue) in self.queues.drain() {
            queue.close();
        }
        for (_, semaphore) in self.semaphores.drain() {
            semaphore.close();
        }
    }
}

impl Kernel for PosixKernel {
    fn tick_period_ms(&self) -> u32 {
        self.clock.period_ms()
    }

    fn tick_count(&self) -> u64 {
        self.clock.ticks()
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn task_create(&self, params: TaskParams<'_>) -> KernelResult<RawHandle> {
        self.tasks.spawn(params)
    }

    fn task_delete_self(&self) -> KernelResult<()> {
        self.tasks.delete_current()
    }

    fn current_task(&self) -> Option<RawHandle> {
        task::current()
    }

    fn task_exists(&self, task: RawHandle) -> bool {
        self.tasks.exists(task)
    }

    fn delay(&self, ticks: u32) {
        if interrupt::in_isr() {
            log::warn!(target: TARGET, "delay from interrupt context ignored");
            return;
        }
        thread::sleep(self.clock.duration_of(ticks));
    }

    /// Host threads cannot be measured; the requested stack is reported.
    fn stack_high_water_mark(&self, task: RawHandle) -> KernelResult<usize> {
        Ok(self.tasks.record(task)?.stack_size)
    }

    fn queue_create(&self, length: usize, item_size: usize) -> KernelResult<RawHandle> {
        self.queues.insert(ByteQueue::new(length, item_size)?)
    }

    fn queue_delete(&self, queue: RawHandle) -> KernelResult<()> {
        self.queues.remove(queue)?.close();
        Ok(())
    }

    fn queue_send(&self, queue: RawHandle, item: &[u8], wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.queues.get(queue)?.send(item, self.clock.deadline(wait))
    }

    fn queue_send_from_isr(&self, queue: RawHandle, item: &[u8]) -> KernelResult<bool> {
        self.queues.get(queue)?.send_from_isr(item)
    }

    fn queue_receive(&self, queue: RawHandle, buf: &mut [u8], wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.queues.get(queue)?.receive(buf, self.clock.deadline(wait))
    }

    fn queue_receive_from_isr(&self, queue: RawHandle, buf: &mut [u8]) -> KernelResult<bool> {
        self.queues.get(queue)?.receive_from_isr(buf)
    }

    fn queue_peek(&self, queue: RawHandle, buf: &mut [u8], wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.queues.get(queue)?.peek(buf, self.clock.deadline(wait))
    }

    fn queue_spaces_available(&self, queue: RawHandle) -> KernelResult<usize> {
        Ok(self.queues.get(queue)?.spaces_available())
    }

    fn mutex_create(&self) -> KernelResult<RawHandle> {
        self.semaphores.insert(Semaphore::mutex())
    }

    fn semaphore_create(&self, limit: u32, initial_count: u32) -> KernelResult<RawHandle> {
        self.semaphores.insert(Semaphore::counting(limit, initial_count)?)
    }

    fn semaphore_delete(&self, semaphore: RawHandle) -> KernelResult<()> {
        self.semaphores.remove(semaphore)?.close();
        Ok(())
    }

    fn semaphore_take(&self, semaphore: RawHandle, wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.semaphores.get(semaphore)?.take(self.clock.deadline(wait))
    }

    fn semaphore_give(&self, semaphore: RawHandle) -> KernelResult<()> {
        task_context()?;
        self.semaphores.get(semaphore)?.give()
    }

    fn semaphore_give_from_isr(&self, semaphore: RawHandle) -> KernelResult<bool> {
        self.semaphores.get(semaphore)?.give_from_isr()
    }

    fn timer_create(
        &self,
        name: Option<&str>,
        period_ticks: u32,
        auto_reload: bool,
        expiry: TimerExpiry,
    ) -> KernelResult<RawHandle> {
        self.timers
            .create(name, self.clock.duration_of(period_ticks), auto_reload, expiry)
    }

    // Timer commands take effect at once, so `wait` never comes into play.

    fn timer_delete(&self, timer: RawHandle, _wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.timers.delete(timer)
    }

    fn timer_start(&self, timer: RawHandle, _wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.timers.start(timer)
    }

    fn timer_stop(&self, timer: RawHandle, _wait: Wait) -> KernelResult<()> {
        task_context()?;
        self.timers.stop(timer)
    }

    fn timer_change_period(
        &self,
        timer: RawHandle,
        period_ticks: u32,
        _wait: Wait,
    ) -> KernelResult<()> {
        task_context()?;
        self.timers
            .change_period(timer, self.clock.duration_of(period_ticks))
    }
}
