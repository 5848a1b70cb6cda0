//! Fixed-size-item FIFO queues.

use std::collections::VecDeque;
use std::time::Instant;

use osal::{KernelError, KernelResult};
use parking_lot::{Condvar, Mutex};

use crate::sync::wait_while;

struct QueueState {
    items: VecDeque<Box<[u8]>>,
    /// Set on delete so blocked callers bail out instead of waiting forever.
    closed: bool,
    receivers: usize,
    senders: usize,
}

pub(crate) struct ByteQueue {
    capacity: usize,
    item_size: usize,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl ByteQueue {
    pub(crate) fn new(capacity: usize, item_size: usize) -> KernelResult<Self> {
        if capacity == 0 {
            return Err(KernelError::Rejected("zero-length queue"));
        }
        if item_size == 0 {
            return Err(KernelError::Rejected("zero-size queue item"));
        }
        Ok(Self {
            capacity,
            item_size,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                receivers: 0,
                senders: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    fn check_size(&self, len: usize) -> KernelResult<()> {
        if len == self.item_size {
            Ok(())
        } else {
            Err(KernelError::ItemSize {
                expected: self.item_size,
                actual: len,
            })
        }
    }

    pub(crate) fn send(&self, item: &[u8], deadline: Option<Instant>) -> KernelResult<()> {
        self.check_size(item.len())?;
        let mut state = self.state.lock();
        state.senders += 1;
        let capacity = self.capacity;
        let ready = wait_while(&self.not_full, &mut state, deadline, |s| {
            !s.closed && s.items.len() >= capacity
        });
        state.senders -= 1;

        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        if !ready {
            return Err(KernelError::Full);
        }
        state.items.push_back(item.into());
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    pub(crate) fn send_from_isr(&self, item: &[u8]) -> KernelResult<bool> {
        self.check_size(item.len())?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        if state.items.len() >= self.capacity {
            return Err(KernelError::Full);
        }
        state.items.push_back(item.into());
        let woken = state.receivers > 0;
        drop(state);
        self.not_empty.notify_one();
        Ok(woken)
    }

    /// Waits for an item and copies it into `buf`, removing it unless
    /// `peek`.
    fn take(&self, buf: &mut [u8], deadline: Option<Instant>, peek: bool) -> KernelResult<()> {
        self.check_size(buf.len())?;
        let mut state = self.state.lock();
        state.receivers += 1;
        let ready = wait_while(&self.not_empty, &mut state, deadline, |s| {
            !s.closed && s.items.is_empty()
        });
        state.receivers -= 1;

        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        if !ready {
            return Err(KernelError::Timeout);
        }
        if peek {
            if let Some(front) = state.items.front() {
                buf.copy_from_slice(front);
            }
            // Another receiver may be waiting for the same item.
            drop(state);
            self.not_empty.notify_one();
        } else if let Some(front) = state.items.pop_front() {
            buf.copy_from_slice(&front);
            drop(state);
            self.not_full.notify_one();
        }
        Ok(())
    }

    pub(crate) fn receive(&self, buf: &mut [u8], deadline: Option<Instant>) -> KernelResult<()> {
        self.take(buf, deadline, false)
    }

    pub(crate) fn peek(&self, buf: &mut [u8], deadline: Option<Instant>) -> KernelResult<()> {
        self.take(buf, deadline, true)
    }

    pub(crate) fn receive_from_isr(&self, buf: &mut [u8]) -> KernelResult<bool> {
        self.check_size(buf.len())?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(KernelError::UnknownHandle);
        }
        let front = state.items.pop_front().ok_or(KernelError::Empty)?;
        buf.copy_from_slice(&front);
        let woken = state.senders > 0;
        drop(state);
        self.not_full.notify_one();
        Ok(woken)
    }

    pub(crate) fn spaces_available(&self) -> usize {
        self.capacity - self.state.lock().items.len()
    }

    /// Wakes every blocked caller with [`KernelError::UnknownHandle`].
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
