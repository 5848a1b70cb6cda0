//! Semaphore manager.

use crate::error::{KernelError, OsError, OsResult};
use crate::kernel::{Kernel, SemaphoreHandle, Wait};
use crate::os::Os;
use crate::trace::Primitive;

impl<K: Kernel> Os<K> {
    /// Creates a counting semaphore holding `initial_count` of at most `limit`.
    pub fn semaphore_create(&self, initial_count: u32, limit: u32) -> OsResult<SemaphoreHandle> {
        if limit == 0 || initial_count > limit {
            return Err(OsError::InvalidParameter);
        }

        let raw = self
            .kernel()
            .semaphore_create(limit, initial_count)
            .map_err(|err| err.to_os(OsError::Platform))?;

        self.account_create(
            Primitive::Semaphore,
            raw,
            format_args!("count {initial_count}, limit {limit}"),
        );
        Ok(SemaphoreHandle::from_raw(raw))
    }

    pub fn semaphore_delete(&self, semaphore: SemaphoreHandle) -> OsResult<()> {
        self.kernel()
            .semaphore_delete(semaphore.raw())
            .map_err(|err| err.to_os(OsError::Platform))?;
        self.account_delete(Primitive::Semaphore, Some(semaphore.raw()));
        Ok(())
    }

    /// Waits for as long as it takes for the count to become non-zero.
    pub fn semaphore_take(&self, semaphore: SemaphoreHandle) -> OsResult<()> {
        self.kernel()
            .semaphore_take(semaphore.raw(), Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// Like [`Os::semaphore_take`] but gives up with [`OsError::Timeout`]
    /// after `wait_ms`.
    pub fn semaphore_try_take(&self, semaphore: SemaphoreHandle, wait_ms: u32) -> OsResult<()> {
        self.kernel()
            .semaphore_take(semaphore.raw(), self.wait_ms(wait_ms))
            .map_err(|err| err.to_os(OsError::Timeout))
    }

    /// Gives the semaphore. A give at the limit is absorbed, not an error.
    pub fn semaphore_give(&self, semaphore: SemaphoreHandle) -> OsResult<()> {
        match self.kernel().semaphore_give(semaphore.raw()) {
            Err(KernelError::UnknownHandle) => Err(OsError::InvalidParameter),
            _ => Ok(()),
        }
    }

    /// Gives from interrupt context; [`OsError::Platform`] if the count is
    /// already at its limit.
    pub fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> OsResult<()> {
        let woken = self
            .kernel()
            .semaphore_give_from_isr(semaphore.raw())
            .map_err(|err| err.to_os(OsError::Platform))?;
        if woken {
            self.kernel().yield_now();
        }
        Ok(())
    }
}
