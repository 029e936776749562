//! Time provider abstraction for testable deadline handling.

use std::time::{SystemTime, UNIX_EPOCH};

/// Trait for providing the current Unix timestamp.
///
/// Offer expiry, auction deadlines and the commit/reveal windows all read
/// time through this seam so tests can drive the clock deterministically.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now_unix(&self) -> u64;
}

/// Production implementation that uses the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl SystemTimeProvider {
    pub const fn new() -> Self {
        Self
    }
}
