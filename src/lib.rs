//! FIFO-fair async synchronization primitives
//!
//! This crate provides cooperative synchronization primitives for
//! coordinating asynchronous tasks on the [compio](https://github.com/compio-rs/compio)
//! runtime:
//!
//! - [`Semaphore`] - counting semaphore with multi-permit, FIFO-fair
//!   acquisition, timed acquisition with state rollback, and broadcast
//!   interruption
//! - [`Mutex`] - mutual-exclusion lock built on the semaphore, with scoped
//!   critical-section helpers
//! - [`PcQueue`] - producer/consumer queue whose readers suspend until
//!   enough items arrive
//!
//! The mutex and queue compose a semaphore rather than reimplementing any
//! queueing; all waiting, fairness, timeout, and cancellation behavior lives
//! in one place.
//!
//! # Example
//!
//! ```rust,no_run
//! use permitq::Semaphore;
//! use std::sync::Arc;
//!
//! #[compio::main]
//! async fn main() {
//!     let sem = Arc::new(Semaphore::new(100));
//!
//!     // Spawn many tasks, but only 100 run concurrently
//!     for i in 0..1000 {
//!         let sem = sem.clone();
//!         compio::runtime::spawn(async move {
//!             sem.acquire(1).await.unwrap();
//!             println!("Task {}", i);
//!             sem.release(1);
//!         });
//!     }
//! }
//! ```

pub mod error;
pub mod mutex;
pub mod queue;
pub mod semaphore;
mod waitq;

// Re-export commonly used types
pub use error::{AcquireError, Result};
pub use mutex::Mutex;
pub use queue::PcQueue;
pub use semaphore::Semaphore;
