//! Strictly increasing request nonces.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Per-client nonce counter.
///
/// Each nonce is the current time in microseconds, unless that is not greater
/// than the previous nonce, in which case the previous nonce plus one is used.
#[derive(Debug, Default)]
pub struct NonceState {
    last: AtomicU64,
}

impl NonceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next nonce using the system clock.
    pub fn next(&self) -> u64 {
        let micros = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        self.next_from(micros)
    }

    /// Issue the next nonce from an explicit clock candidate.
    pub fn next_from(&self, candidate: u64) -> u64 {
        let mut issued = candidate;
        // fetch_update only fails when the closure returns None.
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                issued = if candidate > last {
                    candidate
                } else {
                    last.saturating_add(1)
                };
                Some(issued)
            });
        issued
    }

    /// The most recently issued nonce (0 before the first).
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}
