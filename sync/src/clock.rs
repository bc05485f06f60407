//! Identifier clock for customer ids and pending-change timestamps.
//!
//! Identifiers are anchored to wall-clock milliseconds but strictly
//! monotonic, so two records created within the same millisecond still get
//! distinct, ordered ids.

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues unique, strictly increasing millisecond-epoch identifiers.
#[derive(Debug, Default)]
pub struct ChangeClock {
    last: AtomicU64,
}

impl ChangeClock {
    /// Create a clock that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wall-clock time in milliseconds since the Unix epoch.
    pub fn now_ms() -> Timestamp {
        chrono::Utc::now().timestamp_millis().max(0) as Timestamp
    }

    /// Issue the next identifier: the current time, bumped past anything
    /// issued before.
    pub fn next(&self) -> Timestamp {
        let now = Self::now_ms();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }
}
