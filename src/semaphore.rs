//! Counting semaphore with FIFO-fair multi-permit acquisition
//!
//! The semaphore owns a permit counter and a queue of waiting requests and
//! delegates every operation to the crate's waiter-queue engine. Unlike a
//! plain concurrency limiter, a single call may request several permits at
//! once, timed acquisition restores the counter on expiry, and all current
//! waiters can be cancelled in one broadcast via [`Semaphore::interrupt`].
//!
//! # Example
//!
//! ```rust,no_run
//! use permitq::Semaphore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sem = Arc::new(Semaphore::new(2));
//!
//! sem.acquire(2).await?;
//! // Both permits held; a later acquire would queue until release
//! sem.release(2);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AcquireError, Result};
use crate::waitq::WaitQueue;

/// An async counting semaphore with FIFO-fair waiters
///
/// The semaphore tracks a non-negative number of permits. `acquire(n)` takes
/// `n` of them, suspending until enough have been released; waiting calls are
/// served strictly in arrival order, one permit at a time, so a large request
/// cannot be starved by a stream of small ones.
///
/// # Design
///
/// - **FIFO waiters**: permits released while requests are queued go to the
///   head request before any later one
/// - **Counted completion**: a multi-permit request is woken once, when its
///   last outstanding permit arrives
/// - **Cancel-safe**: dropping an in-flight acquire (including via timeout)
///   returns its permits to the counter
/// - **Cloneable**: clones share one permit pool via `Arc`
#[derive(Clone)]
pub struct Semaphore {
    /// Engine shared between all clones of this semaphore
    engine: Arc<WaitQueue>,
}

impl Semaphore {
    /// Create a semaphore with `permits` initially available
    ///
    /// Zero is valid: every acquire then queues until someone releases.
    ///
    /// # Example
    ///
    /// ```rust
    /// use permitq::Semaphore;
    ///
    /// let sem = Semaphore::new(1024);
    /// assert_eq!(sem.available_permits(), 1024);
    /// ```
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            engine: Arc::new(WaitQueue::new(permits)),
        }
    }

    /// Acquire `wanted` permits, suspending until all of them are delivered
    ///
    /// `wanted == 0` resolves immediately without touching any state. What the
    /// counter can cover is consumed up front; the remainder is queued and
    /// arrives one permit at a time from future releases.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Interrupted`] if [`Semaphore::interrupt`] is
    /// called while this request is queued.
    pub async fn acquire(&self, wanted: usize) -> Result<()> {
        self.engine.acquire(wanted).await
    }

    /// Acquire `wanted` permits within `timeout`
    ///
    /// If the request is satisfiable immediately it is granted without the
    /// clock ever starting. Otherwise the request queues like
    /// [`Semaphore::acquire`]; if the deadline elapses first, the counter is
    /// restored to what it would hold had this call never been made, except
    /// that permits released to *other* waiters during the wait stay with
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Timeout`] when the deadline elapses, or
    /// [`AcquireError::Interrupted`] if interrupted while queued.
    pub async fn acquire_timeout(&self, wanted: usize, timeout: Duration) -> Result<()> {
        if self.try_acquire(wanted) {
            return Ok(());
        }
        match compio::time::timeout(timeout, self.engine.acquire(wanted)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(AcquireError::Timeout { timeout, wanted }),
        }
    }

    /// Take `wanted` permits only if all of them are available right now
    ///
    /// # Example
    ///
    /// ```rust
    /// use permitq::Semaphore;
    ///
    /// let sem = Semaphore::new(1);
    /// assert!(sem.try_acquire(1));
    /// assert!(!sem.try_acquire(1)); // none left
    /// ```
    #[must_use]
    pub fn try_acquire(&self, wanted: usize) -> bool {
        self.engine.try_acquire(wanted)
    }

    /// Return `count` permits
    ///
    /// Queued requests are served first, in FIFO order, one permit at a time;
    /// a single release may therefore complete several waiters. Only once the
    /// queue is empty does the remainder raise the counter. Releasing permits
    /// that were never acquired is allowed and simply raises availability.
    pub fn release(&self, count: usize) {
        self.engine.release(count);
    }

    /// Satisfy every queued waiter unconditionally and reset the counter
    ///
    /// Each waiter resolves successfully regardless of how many permits it
    /// still had outstanding. This is a hard reset, not `count` sequential
    /// releases.
    pub fn release_all(&self, reset_to: usize) {
        self.engine.release_all(reset_to);
    }

    /// Fail every queued waiter with [`AcquireError::Interrupted`] carrying
    /// `reason`, then reset the counter to `reset_to`
    pub fn interrupt(&self, reason: &str, reset_to: usize) {
        self.engine.interrupt(reason, reset_to);
    }

    /// Permits immediately grantable
    ///
    /// Useful for monitoring; the value may change right after reading.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.engine.available()
    }

    /// Permits still owed to queued waiters
    #[must_use]
    pub fn required_permits(&self) -> usize {
        self.engine.required()
    }

    /// Number of queued waiting calls (not a permit count)
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.engine.len()
    }
}
