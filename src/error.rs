//! Error types for permit acquisition

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to a task waiting on a semaphore, mutex, or queue
///
/// Both variants are delivered asynchronously, at the moment the timeout
/// elapses or the interrupt is issued; the engine state is always left
/// consistent when they are reported. The error is `Clone` because an
/// interrupt broadcasts the same failure to every queued waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The deadline of a timed acquire elapsed before enough permits arrived
    #[error("timed out after {timeout:?} waiting for {wanted} permit(s)")]
    Timeout {
        /// The deadline that elapsed
        timeout: Duration,
        /// Permits the call asked for
        wanted: usize,
    },

    /// All waiters were cancelled via `interrupt`, with a caller-supplied reason
    #[error("interrupted: {reason}")]
    Interrupted {
        /// Opaque reason supplied by the interrupting caller
        reason: String,
    },
}

/// Result alias for acquisition operations
pub type Result<T> = std::result::Result<T, AcquireError>;
