//! Controllable time provider for deadline and window tests.

use crate::traits::TimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Mock time provider with a settable clock.
///
/// Clones share the same underlying value, so the harness can advance time
/// and every engine observes the change.
#[derive(Debug, Clone)]
pub struct MockTime {
    current_time: Arc<AtomicU64>,
}

impl MockTime {
    /// Create a clock starting at the given Unix timestamp.
    pub fn new(initial_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(initial_time)),
        }
    }

    /// Set the clock to an absolute timestamp.
    pub fn set(&self, timestamp: u64) {
        self.current_time.store(timestamp, Ordering::SeqCst);
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance(&self, seconds: u64) {
        self.current_time.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Current clock value.
    pub fn get(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

impl Default for MockTime {
    fn default() -> Self {
        Self::new(1_704_067_200) // 2024-01-01 00:00:00 UTC
    }
}

impl TimeProvider for MockTime {
    fn now_unix(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}
