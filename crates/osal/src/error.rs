//! Error taxonomy shared by every operation of the layer.
//!
//! Success is `Ok`; everything else is one of a handful of [`OsError`] kinds.
//! Kernel back-ends report their own [`KernelError`], which each operation
//! translates according to its own contract.

use thiserror::Error;

/// Errors returned by the abstraction layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsError {
    /// A precondition checked before touching the kernel failed, or the
    /// kernel refused the handle/item outright.
    #[error("invalid parameter")]
    InvalidParameter,
    /// The kernel call itself failed with well-formed arguments.
    #[error("platform error")]
    Platform,
    /// A bounded wait expired before the awaited condition occurred.
    #[error("timed out")]
    Timeout,
    /// The timer back-end was used before [`crate::Os::init`].
    #[error("not initialised")]
    NotInitialised,
    /// Bookkeeping storage could not be allocated.
    #[error("out of memory")]
    NoMemory,
}

impl OsError {
    /// Negative integer code of this error, as used by C porting layers.
    pub const fn code(self) -> i32 {
        match self {
            Self::NotInitialised => -2,
            Self::InvalidParameter => -5,
            Self::NoMemory => -6,
            Self::Platform => -8,
            Self::Timeout => -9,
        }
    }
}

/// Result alias for layer operations.
pub type OsResult<T> = Result<T, OsError>;

/// Failures reported by an underlying [`crate::Kernel`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelError {
    /// The handle does not name a live object of the expected kind.
    #[error("unknown kernel handle")]
    UnknownHandle,
    /// An item or buffer did not match the queue's item size.
    #[error("item size mismatch: expected {expected} bytes, got {actual}")]
    ItemSize { expected: usize, actual: usize },
    /// The object could not be allocated.
    #[error("kernel allocation failed")]
    NoMemory,
    /// The queue had no free slot.
    #[error("queue full")]
    Full,
    /// The queue or semaphore had nothing to take.
    #[error("queue or semaphore empty")]
    Empty,
    /// A bounded wait expired.
    #[error("wait timed out")]
    Timeout,
    /// The kernel refused the command (bad argument, wrong owner, limit
    /// reached, blocking call from interrupt context).
    #[error("command rejected: {0}")]
    Rejected(&'static str),
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Maps errors that say "the caller passed garbage" to
    /// [`OsError::InvalidParameter`] and everything else to `fallback`.
    pub(crate) fn to_os(self, fallback: OsError) -> OsError {
        match self {
            Self::UnknownHandle | Self::ItemSize { .. } => OsError::InvalidParameter,
            _ => fallback,
        }
    }
}
