//! # osal
//!
//! A portable OS abstraction layer: tasks, bounded queues, mutexes, counting
//! semaphores and software timers on top of a pluggable real-time kernel,
//! with a process-wide count of every primitive still alive.
//!
//! ## Module Overview
//! - [`kernel`]    – The [`Kernel`] boundary trait, typed handles and waits.
//! - [`os`]        – The [`Os`] facade and its builder.
//! - [`task`], [`queue`], [`semaphore`], [`timer`] – The managers, as
//!   methods on [`Os`].
//! - [`mutex`]     – The [`MutexApi`] contract and the kernel implementation.
//! - [`mutex_debug`] – Ownership bookkeeping decorator for mutexes.
//! - [`private`]   – The default timer back-end.
//! - [`resource`]  – The live-primitive accountant.
//! - [`config`], [`error`] – Configuration and error taxonomy.
//!
//! Kernel ports live in their own crates; `osal-posix` runs the layer on std
//! threads.

extern crate alloc;

pub mod config;
pub mod error;
pub mod kernel;
pub mod mutex;
pub mod mutex_debug;
pub mod os;
pub mod private;
pub mod queue;
pub mod resource;
pub mod semaphore;
pub mod task;
pub mod timer;
mod trace;

pub use config::{OsConfig, OsConfigBuilder};
pub use error::{KernelError, KernelResult, OsError, OsResult};
pub use kernel::{
    Kernel, MutexHandle, QueueHandle, RawHandle, SemaphoreHandle, TaskEntry, TaskHandle,
    TaskParams, TimerExpiry, TimerHandle, Wait,
};
pub use mutex::{ActiveMutexes, MutexApi, PlainMutexes};
pub use mutex_debug::{DebugMutexes, MutexInfo, Owner};
pub use os::{Os, OsBuilder};
pub use private::PrivateTimers;
pub use resource::{resource_alloc_count, ResourceCounter, RESOURCES};
pub use timer::{TimerBackend, TimerCallback};
pub use trace::Primitive;

#[cfg(test)]
mod tests;
