//! Mutual-exclusion lock built on the semaphore
//!
//! A [`Mutex`] is a [`Semaphore`] fixed at capacity 1. It adds no queueing
//! logic of its own; lock acquisition order, timeouts, and interruption all
//! come from the semaphore. On top of the explicit `lock`/`unlock` pair it
//! offers scoped helpers that run a critical section and guarantee the lock
//! is dropped on every exit path, including cancellation of the section's
//! future.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::semaphore::Semaphore;

/// An async, FIFO-fair mutual-exclusion lock
///
/// # Example
///
/// ```rust,no_run
/// use permitq::Mutex;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mutex = Mutex::new();
///
/// let total = mutex.lock_with(|| async { 2 + 2 }).await?;
/// assert_eq!(total, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Mutex {
    sem: Semaphore,
}

/// Releases the lock when the critical section ends for any reason
struct UnlockOnDrop<'a>(&'a Mutex);

impl Drop for UnlockOnDrop<'_> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

impl Mutex {
    /// Create an unlocked mutex
    #[must_use]
    pub fn new() -> Self {
        Self {
            sem: Semaphore::new(1),
        }
    }

    /// Take the lock, suspending until the holder releases it
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Interrupted`] if [`Mutex::interrupt`]
    /// fires while this call is queued.
    pub async fn lock(&self) -> Result<()> {
        self.sem.acquire(1).await
    }

    /// Take the lock within `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Timeout`] when the deadline elapses
    /// with the lock still held elsewhere, or
    /// [`crate::AcquireError::Interrupted`] if interrupted while queued.
    pub async fn lock_timeout(&self, timeout: Duration) -> Result<()> {
        self.sem.acquire_timeout(1, timeout).await
    }

    /// Release the lock, waking the next queued `lock` call if any
    pub fn unlock(&self) {
        self.sem.release(1);
    }

    /// Whether the lock is currently held
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.sem.available_permits() == 0
    }

    /// Fail every queued `lock` call with `reason` and restore full capacity
    ///
    /// A mutex always has exactly one permit, so interruption resets
    /// availability to 1 rather than 0.
    pub fn interrupt(&self, reason: &str) {
        self.sem.interrupt(reason, 1);
    }

    /// Run `section` while holding the lock, releasing it on every exit path
    ///
    /// The lock is taken first; if that fails the section never runs and no
    /// unlock happens. Once the section starts, the lock is released whether
    /// its future completes or is dropped mid-run.
    ///
    /// # Errors
    ///
    /// Propagates the lock acquisition error; the section's own output is
    /// returned untouched.
    pub async fn lock_with<F, Fut, T>(&self, section: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.lock().await?;
        let _unlock = UnlockOnDrop(self);
        Ok(section().await)
    }

    /// Like [`Mutex::lock_with`], but gives up on the lock after `timeout`
    ///
    /// # Errors
    ///
    /// Propagates the timed acquisition error; the section's own output is
    /// returned untouched.
    pub async fn lock_with_timeout<F, Fut, T>(&self, timeout: Duration, section: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.lock_timeout(timeout).await?;
        let _unlock = UnlockOnDrop(self);
        Ok(section().await)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
