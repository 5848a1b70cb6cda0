//! Boundary to the underlying real-time kernel.
//!
//! The layer only ever asks the kernel for a small, fixed set of services:
//! create/delete objects, block, give/take, send/receive and timer commands.
//! Scheduling policy, tick rate and memory allocation stay the kernel's
//! business. A port implements [`Kernel`] once and gets the whole API.

use core::fmt;
use core::num::NonZeroUsize;
use core::time::Duration;

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::KernelResult;

/// Opaque identity of a kernel object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle(NonZeroUsize);

impl RawHandle {
    /// Wraps a kernel object identity; `None` for zero.
    pub const fn new(value: usize) -> Option<Self> {
        match NonZeroUsize::new(value) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0.get())
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(RawHandle);

        impl $name {
            pub const fn from_raw(raw: RawHandle) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> RawHandle {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_handle!(
    /// A kernel task.
    TaskHandle
);
typed_handle!(
    /// A fixed-capacity, fixed-item-size queue.
    QueueHandle
);
typed_handle!(
    /// A binary mutual-exclusion lock.
    MutexHandle
);
typed_handle!(
    /// A counting semaphore.
    SemaphoreHandle
);
typed_handle!(
    /// A software timer.
    TimerHandle
);

/// How long a kernel call may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Until the condition occurs.
    Forever,
    /// At most this many ticks; zero polls once.
    Ticks(u32),
}

impl Wait {
    pub const NONE: Wait = Wait::Ticks(0);

    /// Converts a millisecond wait, truncating to whole ticks.
    pub fn from_ms(ms: u32, tick_period_ms: u32) -> Self {
        Wait::Ticks(ms / tick_period_ms.max(1))
    }

    /// Wall-clock length of the wait, `None` for [`Wait::Forever`].
    pub fn duration(self, tick_period_ms: u32) -> Option<Duration> {
        match self {
            Wait::Forever => None,
            Wait::Ticks(ticks) => Some(Duration::from_millis(
                u64::from(ticks) * u64::from(tick_period_ms),
            )),
        }
    }
}

/// Entry function of a task; any parameter is captured by the closure.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Called in the kernel's timer service context when a timer expires.
pub type TimerExpiry = Arc<dyn Fn(RawHandle) + Send + Sync + 'static>;

/// Everything the kernel needs to start a task.
pub struct TaskParams<'a> {
    pub entry: TaskEntry,
    pub name: &'a str,
    pub stack_size: usize,
    pub priority: u8,
}

impl fmt::Debug for TaskParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskParams")
            .field("name", &self.name)
            .field("stack_size", &self.stack_size)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Services the layer requires from the underlying kernel.
///
/// `*_from_isr` operations must never block; they return `Ok(true)` when the
/// operation woke a task the caller should yield to. A semaphore handle
/// created by [`Kernel::mutex_create`] is accepted by the semaphore
/// take/give/delete operations.
pub trait Kernel: Send + Sync + 'static {
    /// Length of one tick in milliseconds.
    fn tick_period_ms(&self) -> u32;
    /// Ticks elapsed since the kernel started.
    fn tick_count(&self) -> u64;
    /// Gives the processor to another ready task.
    fn yield_now(&self);

    fn task_create(&self, params: TaskParams<'_>) -> KernelResult<RawHandle>;
    /// Deletes the calling task.
    fn task_delete_self(&self) -> KernelResult<()>;
    /// The calling task, `None` outside of any kernel task.
    fn current_task(&self) -> Option<RawHandle>;
    fn task_exists(&self, task: RawHandle) -> bool;
    fn delay(&self, ticks: u32);
    /// Lowest amount of stack, in bytes, that has remained free.
    fn stack_high_water_mark(&self, task: RawHandle) -> KernelResult<usize>;

    fn queue_create(&self, length: usize, item_size: usize) -> KernelResult<RawHandle>;
    fn queue_delete(&self, queue: RawHandle) -> KernelResult<()>;
    fn queue_send(&self, queue: RawHandle, item: &[u8], wait: Wait) -> KernelResult<()>;
    fn queue_send_from_isr(&self, queue: RawHandle, item: &[u8]) -> KernelResult<bool>;
    fn queue_receive(&self, queue: RawHandle, buf: &mut [u8], wait: Wait) -> KernelResult<()>;
    fn queue_receive_from_isr(&self, queue: RawHandle, buf: &mut [u8]) -> KernelResult<bool>;
    fn queue_peek(&self, queue: RawHandle, buf: &mut [u8], wait: Wait) -> KernelResult<()>;
    fn queue_spaces_available(&self, queue: RawHandle) -> KernelResult<usize>;

    fn mutex_create(&self) -> KernelResult<RawHandle>;
    fn semaphore_create(&self, limit: u32, initial_count: u32) -> KernelResult<RawHandle>;
    fn semaphore_delete(&self, semaphore: RawHandle) -> KernelResult<()>;
    fn semaphore_take(&self, semaphore: RawHandle, wait: Wait) -> KernelResult<()>;
    fn semaphore_give(&self, semaphore: RawHandle) -> KernelResult<()>;
    fn semaphore_give_from_isr(&self, semaphore: RawHandle) -> KernelResult<bool>;

    /// Creates a dormant timer.
    fn timer_create(
        &self,
        name: Option<&str>,
        period_ticks: u32,
        auto_reload: bool,
        expiry: TimerExpiry,
    ) -> KernelResult<RawHandle>;
    fn timer_delete(&self, timer: RawHandle, wait: Wait) -> KernelResult<()>;
    fn timer_start(&self, timer: RawHandle, wait: Wait) -> KernelResult<()>;
    fn timer_stop(&self, timer: RawHandle, wait: Wait) -> KernelResult<()>;
    /// Changes the period; a dormant timer is started.
    fn timer_change_period(&self, timer: RawHandle, period_ticks: u32, wait: Wait)
        -> KernelResult<()>;
}
