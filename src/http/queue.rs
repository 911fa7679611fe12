//! Single-lane request serialization.
//!
//! The server rejects nonces that arrive out of order, so a client instance
//! never has more than one request in flight. There is no wait-list: a caller
//! that finds the lane busy sleeps a random 0–10 ms and tries again. Requests
//! are therefore serialized but not strictly FIFO under contention; callers
//! that need strict ordering await each call before issuing the next.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Upper bound of the contention backoff, in milliseconds.
const MAX_BACKOFF_MS: u64 = 10;

/// The execution lane shared by all clones of one client.
#[derive(Debug, Clone, Default)]
pub struct RequestLane {
    inner: Arc<LaneState>,
}

#[derive(Debug, Default)]
struct LaneState {
    busy: AtomicBool,
    contended_waits: AtomicU64,
}

impl RequestLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a request currently holds the lane.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Total number of backoff sleeps taken so far.
    pub fn contended_waits(&self) -> u64 {
        self.inner.contended_waits.load(Ordering::Relaxed)
    }

    /// Take the lane without waiting.
    pub fn try_acquire(&self) -> Option<LaneGuard> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LaneGuard {
                lane: self.inner.clone(),
            })
    }

    /// Wait for the lane.
    ///
    /// Returns `None` if `cancel` fires first. There is no attempt limit.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<LaneGuard> {
        let mut attempts: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(guard) = self.try_acquire() {
                if attempts > 0 {
                    tracing::trace!(attempts, "Acquired request lane after contention");
                }
                return Some(guard);
            }

            attempts += 1;
            self.inner.contended_waits.fetch_add(1, Ordering::Relaxed);
            let delay = Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_BACKOFF_MS));
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Holds the lane; releases it when dropped, whatever the request's outcome.
#[derive(Debug)]
pub struct LaneGuard {
    lane: Arc<LaneState>,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        self.lane.busy.store(false, Ordering::Release);
    }
}
