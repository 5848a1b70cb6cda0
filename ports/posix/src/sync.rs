//! Blocking helpers shared by queues and semaphores.

use std::time::Instant;

use osal::{KernelError, KernelResult};
use parking_lot::{Condvar, MutexGuard};

use crate::interrupt;

/// Waits on `cond` while `blocked` holds, up to `deadline` (`None` waits
/// forever). Returns `false` if the deadline passed with the caller still
/// blocked.
pub(crate) fn wait_while<T>(
    cond: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    deadline: Option<Instant>,
    mut blocked: impl FnMut(&T) -> bool,
) -> bool {
    while blocked(&**guard) {
        match deadline {
            None => cond.wait(guard),
            Some(deadline) => {
                if cond.wait_until(guard, deadline).timed_out() {
                    return !blocked(&**guard);
                }
            }
        }
    }
    true
}

/// Refuses calls that may block while in simulated interrupt context.
pub(crate) fn task_context() -> KernelResult<()> {
    if interrupt::in_isr() {
        Err(KernelError::Rejected("blocking call from interrupt context"))
    } else {
        Ok(())
    }
}
