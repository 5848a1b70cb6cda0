//! Queue manager.
//!
//! Items are copied in and out as byte slices of exactly the queue's item
//! size. Task-context calls may block; the `_from_isr` variants never do.

use crate::error::{KernelError, OsError, OsResult};
use crate::kernel::{Kernel, QueueHandle, Wait};
use crate::os::Os;
use crate::trace::Primitive;

const DEBUG_TARGET: &str = "osal::queue";

impl<K: Kernel> Os<K> {
    /// Creates a queue of `length` items of `item_size` bytes each.
    pub fn queue_create(&self, length: usize, item_size: usize) -> OsResult<QueueHandle> {
        let raw = self
            .kernel()
            .queue_create(length, item_size)
            .map_err(|err| err.to_os(OsError::Platform))?;

        self.account_create(
            Primitive::Queue,
            raw,
            format_args!("length {length}, item size {item_size} bytes"),
        );
        Ok(QueueHandle::from_raw(raw))
    }

    /// Deletes a queue; any items still in it are lost.
    pub fn queue_delete(&self, queue: QueueHandle) -> OsResult<()> {
        self.kernel()
            .queue_delete(queue.raw())
            .map_err(|err| err.to_os(OsError::Platform))?;
        self.account_delete(Primitive::Queue, Some(queue.raw()));
        Ok(())
    }

    /// Sends `item`, waiting for as long as it takes for a free slot.
    pub fn queue_send(&self, queue: QueueHandle, item: &[u8]) -> OsResult<()> {
        if self.config().queue_debug {
            return self.queue_send_polling(queue, item);
        }

        self.kernel()
            .queue_send(queue.raw(), item, Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// Polls instead of blocking inside the kernel, complaining about once a
    /// second while the queue stays full.
    fn queue_send_polling(&self, queue: QueueHandle, item: &[u8]) -> OsResult<()> {
        let report_every = self.config().attempts_per_second();
        let mut attempts: u32 = 0;
        loop {
            match self.kernel().queue_send(queue.raw(), item, Wait::NONE) {
                Ok(()) => return Ok(()),
                Err(KernelError::Full | KernelError::Timeout) => {
                    if attempts % report_every == 0 {
                        log::warn!(target: DEBUG_TARGET, "queue {queue} is full, retrying...");
                    }
                    attempts = attempts.wrapping_add(1);
                    self.task_block(self.config().yield_ms);
                }
                Err(err) => return Err(err.to_os(OsError::Platform)),
            }
        }
    }

    /// Sends `item` from interrupt context; [`OsError::Platform`] if full.
    pub fn queue_send_from_isr(&self, queue: QueueHandle, item: &[u8]) -> OsResult<()> {
        let woken = self
            .kernel()
            .queue_send_from_isr(queue.raw(), item)
            .map_err(|err| err.to_os(OsError::Platform))?;
        if woken {
            self.kernel().yield_now();
        }
        Ok(())
    }

    /// Receives the oldest item into `buf`, waiting for as long as it takes.
    pub fn queue_receive(&self, queue: QueueHandle, buf: &mut [u8]) -> OsResult<()> {
        self.kernel()
            .queue_receive(queue.raw(), buf, Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// Receives from interrupt context; [`OsError::Platform`] if empty.
    pub fn queue_receive_from_isr(&self, queue: QueueHandle, buf: &mut [u8]) -> OsResult<()> {
        let woken = self
            .kernel()
            .queue_receive_from_isr(queue.raw(), buf)
            .map_err(|err| err.to_os(OsError::Platform))?;
        if woken {
            self.kernel().yield_now();
        }
        Ok(())
    }

    /// Receives, giving up with [`OsError::Timeout`] after `wait_ms`.
    /// A zero wait polls once.
    pub fn queue_try_receive(
        &self,
        queue: QueueHandle,
        wait_ms: u32,
        buf: &mut [u8],
    ) -> OsResult<()> {
        self.kernel()
            .queue_receive(queue.raw(), buf, self.wait_ms(wait_ms))
            .map_err(|err| err.to_os(OsError::Timeout))
    }

    /// Copies the oldest item into `buf` without removing it, waiting for one
    /// to arrive if necessary.
    pub fn queue_peek(&self, queue: QueueHandle, buf: &mut [u8]) -> OsResult<()> {
        self.kernel()
            .queue_peek(queue.raw(), buf, Wait::Forever)
            .map_err(|err| err.to_os(OsError::Platform))
    }

    /// Number of free slots.
    pub fn queue_free_slots(&self, queue: QueueHandle) -> OsResult<usize> {
        self.kernel()
            .queue_spaces_available(queue.raw())
            .map_err(|err| err.to_os(OsError::Platform))
    }
}
