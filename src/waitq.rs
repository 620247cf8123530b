//! Core permit-counted waiter queue
//!
//! This is the bookkeeping that every public primitive in the crate delegates
//! to: a counter of immediately grantable permits plus a FIFO queue of pending
//! requests. On every acquire/release/timeout/interrupt event it decides how
//! many permits are available, which waiting request receives them, and how to
//! undo a partially-satisfied request that is abandoned before completion.
//!
//! A single `std::sync::Mutex` guards the whole state, so each operation runs
//! as one atomic step relative to all others. Permits released while requests
//! are queued flow directly to the head request's outstanding units, one at a
//! time; they reach the counter only once the queue is empty.
//!
//! Each queued request is a counted completion: `remaining` tracks how many
//! units are still owed, and the task is woken exactly once, when the count
//! hits zero or the request is cancelled.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::{debug, trace};

use crate::error::AcquireError;

/// Shared engine state: permit counter plus FIFO waiter queue
pub(crate) struct WaitQueue {
    state: Mutex<State>,
}

struct State {
    /// Permits immediately grantable. Never incremented while waiters are
    /// queued except by an abandoned request's rollback.
    permits: usize,
    /// Pending requests, insertion order = arrival order
    waiters: VecDeque<Waiter>,
    /// Outcomes for requests that left the queue but whose future has not yet
    /// observed the result
    finished: HashMap<u64, Result<(), AcquireError>>,
    next_id: u64,
}

/// One pending request for permits
struct Waiter {
    id: u64,
    /// Units still to be delivered before this request is satisfied
    remaining: usize,
    waker: Option<Waker>,
}

/// Permits to return to the counter when a queued request is abandoned.
///
/// `reserved` permits were taken from the counter when the request arrived,
/// `deficit` units were queued, and `remaining` of them are still undelivered
/// at abandonment. The counter gets back the reservation plus every unit the
/// request had already received; permits delivered to *other* requests in the
/// meantime stay delivered.
pub(crate) const fn rolled_back_permits(reserved: usize, deficit: usize, remaining: usize) -> usize {
    reserved + (deficit - remaining)
}

impl WaitQueue {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                waiters: VecDeque::new(),
                finished: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// A poisoned lock only means another thread panicked mid-operation; the
    /// state itself is still structurally valid, so keep going.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Permits immediately grantable
    pub(crate) fn available(&self) -> usize {
        self.lock().permits
    }

    /// Sum of outstanding units across all queued requests
    pub(crate) fn required(&self) -> usize {
        self.lock().waiters.iter().map(|w| w.remaining).sum()
    }

    /// Number of queued requests (distinct waiting calls, not permit count)
    pub(crate) fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Take `wanted` permits if all of them are available right now
    pub(crate) fn try_acquire(&self, wanted: usize) -> bool {
        let mut state = self.lock();
        if wanted <= state.permits {
            state.permits -= wanted;
            true
        } else {
            false
        }
    }

    /// Future resolving once `wanted` permits have been delivered
    ///
    /// Lazy: no state changes until the first poll. Dropping the future while
    /// it is queued rolls the counter back per [`rolled_back_permits`].
    pub(crate) fn acquire(&self, wanted: usize) -> Acquire<'_> {
        Acquire {
            queue: self,
            wanted,
            phase: Phase::Init,
        }
    }

    /// Return `count` permits, delivering them to queued requests in FIFO
    /// order one unit at a time; the remainder falls through to the counter
    pub(crate) fn release(&self, count: usize) {
        self.lock().release(count);
    }

    /// Satisfy every queued request unconditionally, regardless of how many
    /// units it still has outstanding, and reset the counter
    pub(crate) fn release_all(&self, reset_to: usize) {
        let mut state = self.lock();
        let woken = state.waiters.len();
        while let Some(waiter) = state.waiters.pop_front() {
            state.finish(waiter, Ok(()));
        }
        state.permits = reset_to;
        if woken > 0 {
            debug!(woken, reset_to, "released all waiters");
        }
    }

    /// Fail every queued request with `Interrupted` and reset the counter
    pub(crate) fn interrupt(&self, reason: &str, reset_to: usize) {
        let mut state = self.lock();
        let failed = state.waiters.len();
        while let Some(waiter) = state.waiters.pop_front() {
            state.finish(
                waiter,
                Err(AcquireError::Interrupted {
                    reason: reason.to_owned(),
                }),
            );
        }
        state.permits = reset_to;
        if failed > 0 {
            debug!(failed, reset_to, reason, "interrupted all waiters");
        }
    }
}

impl State {
    fn release(&mut self, mut count: usize) {
        while count > 0 {
            let Some(head) = self.waiters.front_mut() else {
                self.permits += count;
                return;
            };
            head.remaining -= 1;
            count -= 1;
            if head.remaining == 0 {
                if let Some(done) = self.waiters.pop_front() {
                    self.finish(done, Ok(()));
                }
            }
        }
    }

    /// Record a request's outcome and wake its task once
    fn finish(&mut self, waiter: Waiter, outcome: Result<(), AcquireError>) {
        self.finished.insert(waiter.id, outcome);
        if let Some(waker) = waiter.waker {
            waker.wake();
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    /// Not yet polled; no state has been touched
    Init,
    /// Queued with `deficit` units outstanding after reserving `reserved`
    /// permits from the counter
    Waiting {
        id: u64,
        reserved: usize,
        deficit: usize,
    },
    Done,
}

/// Future returned by [`WaitQueue::acquire`]
///
/// First poll runs the immediate path: consume what the counter can give,
/// resolve if that covers the request, otherwise queue the deficit and
/// suspend. Later polls only check whether the request has finished and
/// refresh the stored waker.
pub(crate) struct Acquire<'a> {
    queue: &'a WaitQueue,
    wanted: usize,
    phase: Phase,
}

impl Future for Acquire<'_> {
    type Output = Result<(), AcquireError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.phase {
            Phase::Init => {
                if this.wanted == 0 {
                    this.phase = Phase::Done;
                    return Poll::Ready(Ok(()));
                }
                let mut state = this.queue.lock();
                let reserved = this.wanted.min(state.permits);
                state.permits -= reserved;
                if reserved == this.wanted {
                    this.phase = Phase::Done;
                    return Poll::Ready(Ok(()));
                }
                let deficit = this.wanted - reserved;
                let id = state.next_id;
                state.next_id += 1;
                state.waiters.push_back(Waiter {
                    id,
                    remaining: deficit,
                    waker: Some(cx.waker().clone()),
                });
                this.phase = Phase::Waiting {
                    id,
                    reserved,
                    deficit,
                };
                Poll::Pending
            }
            Phase::Waiting { id, .. } => {
                let mut state = this.queue.lock();
                if let Some(outcome) = state.finished.remove(&id) {
                    this.phase = Phase::Done;
                    return Poll::Ready(outcome);
                }
                if let Some(waiter) = state.waiters.iter_mut().find(|w| w.id == id) {
                    waiter.waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
            Phase::Done => panic!("Acquire polled after completion"),
        }
    }
}

impl Drop for Acquire<'_> {
    fn drop(&mut self) {
        let Phase::Waiting {
            id,
            reserved,
            deficit,
        } = self.phase
        else {
            return;
        };
        let mut state = self.queue.lock();
        if let Some(outcome) = state.finished.remove(&id) {
            // The request completed but the future was dropped before
            // observing it (a release racing a timeout). Delivered permits
            // re-enter the pool through the normal release path.
            if outcome.is_ok() {
                state.release(self.wanted);
            }
        } else if let Some(pos) = state.waiters.iter().position(|w| w.id == id) {
            if let Some(waiter) = state.waiters.remove(pos) {
                let credit = rolled_back_permits(reserved, deficit, waiter.remaining);
                state.permits += credit;
                trace!(
                    reserved,
                    deficit,
                    remaining = waiter.remaining,
                    credit,
                    "abandoned acquire rolled back"
                );
            }
        }
    }
}
