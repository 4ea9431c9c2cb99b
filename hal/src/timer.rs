//! # Clock
//!
//! Time source for entry timestamps.
//!
//! ## Philosophy
//!
//! **Time is a service, not a global variable.**
//!
//! The filesystem never calls the system clock directly. It asks a [`Clock`],
//! which makes timestamp behaviour observable and deterministic under test.
//!
//! ## Design Principles
//!
//! 1. **Seconds since the Unix epoch**: one unit everywhere
//! 2. **Non-blocking**: always returns immediately
//! 3. **Swappable**: `SystemClock` in a session, `ManualClock` in tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock timestamps
///
/// # Examples
///
/// ```
/// use hal::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// assert_eq!(clock.now(), 1_000);
/// clock.advance(5);
/// assert_eq!(clock.now(), 1_005);
/// ```
pub trait Clock {
    /// Returns the current time in seconds since the Unix epoch
    fn now(&self) -> u64;
}

/// Clock backed by the host's system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // A host clock set before 1970 reads as the epoch itself
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Explicitly advanced clock
///
/// Clones share the same underlying time, so a test can keep one handle
/// while the filesystem owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start` seconds
    pub fn new(start: u64) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Advances every handle of this clock by `delta` seconds
    pub fn advance(&self, delta: u64) {
        self.seconds.fetch_add(delta, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value
    pub fn set(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), 100);

        clock.advance(50);
        assert_eq!(clock.now(), 150);

        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();

        handle.advance(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
