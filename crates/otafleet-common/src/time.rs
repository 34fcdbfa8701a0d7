// ============================================
// File: crates/otafleet-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Main Functionality
//! - `unix_timestamp`: Seconds since the Unix epoch for outcome records
//! - `Stopwatch`: Lazily started monotonic timer used to measure the
//!   update window of a session
//!
//! ## ⚠️ Important Note for Next Developer
//! - Durations are always measured with `Instant` (monotonic), never with
//!   wall-clock differences
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A monotonic timer that starts on demand.
///
/// An unstarted stopwatch reports zero elapsed time. Starting twice keeps
/// the first start point.
///
/// # Example
/// ```
/// use otafleet_common::time::Stopwatch;
///
/// let mut sw = Stopwatch::new();
/// assert_eq!(sw.elapsed().as_nanos(), 0);
/// sw.start();
/// assert!(sw.is_running());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
}

impl Stopwatch {
    /// Creates an unstarted stopwatch.
    #[must_use]
    pub const fn new() -> Self {
        Self { started: None }
    }

    /// Starts the stopwatch if it has not been started yet.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Returns `true` once `start` has been called.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Returns the time since `start`, or zero if never started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}
