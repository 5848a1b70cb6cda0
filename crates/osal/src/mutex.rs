//! Mutex manager.
//!
//! [`MutexApi`] is the contract; [`PlainMutexes`] fulfils it straight on the
//! kernel. With the `mutex-debug` feature the [`Os`] routes every call
//! through [`DebugMutexes`](crate::mutex_debug::DebugMutexes) first, which
//! keeps the same contract.

use alloc::sync::Arc;

use crate::error::{KernelError, OsError, OsResult};
use crate::kernel::{Kernel, MutexHandle, Wait};
use crate::os::Os;
use crate::resource::ResourceCounter;
use crate::trace::{self, Primitive};

#[cfg(feature = "mutex-debug")]
use crate::mutex_debug::DebugMutexes;

/// Operations every mutex implementation offers.
pub trait MutexApi: Send + Sync {
    fn create(&self) -> OsResult<MutexHandle>;
    fn delete(&self, mutex: MutexHandle) -> OsResult<()>;
    /// Blocks until the mutex is held by the caller.
    fn lock(&self, mutex: MutexHandle) -> OsResult<()>;
    /// [`OsError::Timeout`] if the mutex is not acquired within `wait_ms`.
    fn try_lock(&self, mutex: MutexHandle, wait_ms: u32) -> OsResult<()>;
    /// Releasing a mutex the caller does not hold is not detected.
    fn unlock(&self, mutex: MutexHandle) -> OsResult<()>;
}

/// Mutexes implemented directly on kernel mutex semaphores.
pub struct PlainMutexes<K: Kernel> {
    kernel: Arc<K>,
    resources: &'static ResourceCounter,
}

impl<K: Kernel> PlainMutexes<K> {
    pub fn new(kernel: Arc<K>, resources: &'static ResourceCounter) -> Self {
        Self { kernel, resources }
    }
}

impl<K: Kernel> MutexApi for PlainMutexes<K> {
    fn create(&self) -> OsResult<MutexHandle> {
        let raw = self
            .kernel
            .mutex_create()
            .map_err(|err| err.to_os(OsError::Platform))?;
        self.resources.increment();
        trace::created(Primitive::Mutex, raw, self.resources.current(), format_args!("binary"));
        Ok(MutexHandle::from_raw(raw))
    }

    fn delete(&self, mutex: MutexHandle) -> OsResult<()> {
        self.kernel
            .semaphore_delete(mutex.raw())
            .map_err(|err| err.to_os(OsError::Platform))?;
        self.resources.decrement();
        trace::deleted(Primitive::Mutex, Some(mutex.raw()), self.resources.current());
        Ok(())
    }

    fn lock(&self, mutex: MutexHandle) -> OsResult<()> {
        self.kernel
            .semaphore_take(mutex.raw(), Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    fn try_lock(&self, mutex: MutexHandle, wait_ms: u32) -> OsResult<()> {
        let wait = Wait::from_ms(wait_ms, self.kernel.tick_period_ms());
        self.kernel
            .semaphore_take(mutex.raw(), wait)
            .map_err(|err| err.to_os(OsError::Timeout))
    }

    fn unlock(&self, mutex: MutexHandle) -> OsResult<()> {
        match self.kernel.semaphore_give(mutex.raw()) {
            Err(KernelError::UnknownHandle) => Err(OsError::InvalidParameter),
            _ => Ok(()),
        }
    }
}

/// The mutex implementation backing [`Os`] in this build.
#[cfg(not(feature = "mutex-debug"))]
pub type ActiveMutexes<K> = PlainMutexes<K>;

/// The mutex implementation backing [`Os`] in this build.
#[cfg(feature = "mutex-debug")]
pub type ActiveMutexes<K> = DebugMutexes<PlainMutexes<K>>;

#[cfg(not(feature = "mutex-debug"))]
pub(crate) fn active_mutexes<K: Kernel>(
    kernel: Arc<K>,
    resources: &'static ResourceCounter,
) -> ActiveMutexes<K> {
    PlainMutexes::new(kernel, resources)
}

#[cfg(feature = "mutex-debug")]
pub(crate) fn active_mutexes<K: Kernel>(
    kernel: Arc<K>,
    resources: &'static ResourceCounter,
) -> ActiveMutexes<K> {
    DebugMutexes::new(PlainMutexes::new(kernel, resources))
}

impl<K: Kernel> Os<K> {
    /// The mutex implementation this build routes calls through.
    pub fn mutexes(&self) -> &ActiveMutexes<K> {
        &self.inner.mutexes
    }

    pub fn mutex_create(&self) -> OsResult<MutexHandle> {
        self.inner.mutexes.create()
    }

    pub fn mutex_delete(&self, mutex: MutexHandle) -> OsResult<()> {
        self.inner.mutexes.delete(mutex)
    }

    #[track_caller]
    pub fn mutex_lock(&self, mutex: MutexHandle) -> OsResult<()> {
        self.inner.mutexes.lock(mutex)
    }

    #[track_caller]
    pub fn mutex_try_lock(&self, mutex: MutexHandle, wait_ms: u32) -> OsResult<()> {
        self.inner.mutexes.try_lock(mutex, wait_ms)
    }

    pub fn mutex_unlock(&self, mutex: MutexHandle) -> OsResult<()> {
        self.inner.mutexes.unlock(mutex)
    }
}
