//! Blocking bounded-wait producer/consumer queue
//!
//! An unbounded item buffer paired with an internal [`Semaphore`] whose
//! permit count always equals the number of buffered items. Writers append
//! and release that many permits; readers acquire permits first and only
//! then dequeue, so a reader suspends exactly until enough items exist. All
//! waiting, fairness, timeout, and interrupt behavior comes from the
//! semaphore; the queue adds no synchronization logic of its own.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::Result;
use crate::semaphore::Semaphore;

/// A FIFO item queue whose readers suspend until enough items arrive
///
/// # Example
///
/// ```rust,no_run
/// use permitq::PcQueue;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = PcQueue::with_items([1, 2, 3]);
///
/// let front = queue.read(2).await?;
/// assert_eq!(front, vec![1, 2]);
/// assert_eq!(queue.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PcQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    /// Buffered items; length always matches the semaphore's permit count
    buffer: Mutex<VecDeque<T>>,
    /// One permit per buffered item
    items: Semaphore,
}

impl<T> PcQueue<T> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(VecDeque::new()),
                items: Semaphore::new(0),
            }),
        }
    }

    /// Create a queue pre-filled with `items`
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        let buffer: VecDeque<T> = items.into_iter().collect();
        let len = buffer.len();
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(buffer),
                items: Semaphore::new(len),
            }),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `items` and wake readers waiting for them
    pub fn write(&self, items: impl IntoIterator<Item = T>) {
        let mut appended = 0;
        {
            let mut buffer = self.buffer();
            for item in items {
                buffer.push_back(item);
                appended += 1;
            }
        }
        self.inner.items.release(appended);
    }

    /// Remove and return the first `count` items, suspending until the
    /// buffer holds that many
    ///
    /// `count == 0` resolves immediately with an empty vec.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Interrupted`] if
    /// [`PcQueue::interrupt`] fires while this read is waiting.
    pub async fn read(&self, count: usize) -> Result<Vec<T>> {
        self.inner.items.acquire(count).await?;
        Ok(self.dequeue(count))
    }

    /// Like [`PcQueue::read`], but gives up after `timeout`
    ///
    /// On timeout the buffer is untouched: items are only dequeued after the
    /// underlying acquire succeeds, and the semaphore's rollback restores the
    /// permit state on expiry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Timeout`] when the deadline elapses, or
    /// [`crate::AcquireError::Interrupted`] if interrupted while waiting.
    pub async fn read_timeout(&self, count: usize, timeout: Duration) -> Result<Vec<T>> {
        self.inner.items.acquire_timeout(count, timeout).await?;
        Ok(self.dequeue(count))
    }

    /// Remove and return the first item, suspending until one exists
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Interrupted`] if
    /// [`PcQueue::interrupt`] fires while this read is waiting.
    pub async fn read_one(&self) -> Result<T> {
        self.inner.items.acquire(1).await?;
        Ok(self.dequeue_one())
    }

    /// Like [`PcQueue::read_one`], but gives up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcquireError::Timeout`] when the deadline elapses, or
    /// [`crate::AcquireError::Interrupted`] if interrupted while waiting.
    pub async fn read_one_timeout(&self, timeout: Duration) -> Result<T> {
        self.inner.items.acquire_timeout(1, timeout).await?;
        Ok(self.dequeue_one())
    }

    /// Replace the buffer with `items` and fail every waiting read with
    /// `reason`
    ///
    /// The internal semaphore is reset to the new buffer length, so permit
    /// count and item count stay in lockstep.
    pub fn interrupt(&self, reason: &str, items: impl IntoIterator<Item = T>) {
        let mut buffer = self.buffer();
        *buffer = items.into_iter().collect();
        self.inner.items.interrupt(reason, buffer.len());
    }

    /// Number of buffered items
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    /// Number of reads currently waiting for items
    #[must_use]
    pub fn waiting_reads(&self) -> usize {
        self.inner.items.waiters()
    }

    // Only called after `count` permits were acquired, so the buffer is
    // guaranteed to hold at least that many items.
    fn dequeue(&self, count: usize) -> Vec<T> {
        let mut buffer = self.buffer();
        buffer.drain(..count).collect()
    }

    fn dequeue_one(&self) -> T {
        match self.buffer().pop_front() {
            Some(item) => item,
            None => unreachable!("permit held without a buffered item"),
        }
    }
}

impl<T> Default for PcQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquireError;

    #[compio::test]
    async fn prefilled_queue_reads_immediately() {
        let queue = PcQueue::with_items([1, 2, 3]);
        assert_eq!(queue.read(2).await.unwrap(), vec![1, 2]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.read_one().await.unwrap(), 3);
        assert!(queue.is_empty());
    }

    #[compio::test]
    async fn read_zero_returns_empty_without_waiting() {
        let queue: PcQueue<u32> = PcQueue::new();
        assert_eq!(queue.read(0).await.unwrap(), Vec::<u32>::new());
    }

    #[compio::test]
    async fn write_preserves_fifo_order_across_calls() {
        let queue = PcQueue::new();
        queue.write(["a", "b"]);
        queue.write(["c"]);
        assert_eq!(queue.read(3).await.unwrap(), vec!["a", "b", "c"]);
    }

    #[compio::test]
    async fn read_suspends_until_enough_items_are_written() {
        let queue = PcQueue::new();
        let reader = {
            let queue = queue.clone();
            compio::runtime::spawn(async move { queue.read(2).await })
        };

        compio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.waiting_reads(), 1);

        queue.write([10]);
        compio::time::sleep(Duration::from_millis(10)).await;
        // One item is not enough for a two-item read.
        assert_eq!(queue.waiting_reads(), 1);

        queue.write([20]);
        assert_eq!(reader.await.unwrap().unwrap(), vec![10, 20]);
        assert!(queue.is_empty());
    }

    #[compio::test]
    async fn read_timeout_leaves_buffer_untouched() {
        let queue = PcQueue::with_items([1]);
        let err = queue
            .read_timeout(3, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { .. }));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.waiting_reads(), 0);
        // The single item is still readable afterwards.
        assert_eq!(queue.read_one().await.unwrap(), 1);
    }

    #[compio::test]
    async fn read_one_timeout_on_empty_queue_times_out() {
        let queue: PcQueue<u8> = PcQueue::new();
        let err = queue
            .read_one_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { wanted: 1, .. }));
    }

    #[compio::test]
    async fn interrupt_replaces_buffer_and_fails_waiting_reads() {
        let queue = PcQueue::with_items([1]);
        let reader = {
            let queue = queue.clone();
            compio::runtime::spawn(async move { queue.read(5).await })
        };
        compio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.waiting_reads(), 1);

        queue.interrupt("reset", [7, 8]);
        let err = reader.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            AcquireError::Interrupted {
                reason: "reset".to_owned()
            }
        );

        // Replacement content is readable and permits match its length.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.read(2).await.unwrap(), vec![7, 8]);
        assert!(queue.is_empty());
    }
}
