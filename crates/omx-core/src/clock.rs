//! Time sources.
//!
//! Deadlines and throttle windows use a monotonic nanosecond clock so
//! they are immune to wall-clock adjustments; order timestamps use Unix
//! milliseconds for external consumers.

use once_cell::sync::Lazy;
use std::time::Instant;

static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanoseconds since process start.
#[must_use]
pub fn monotonic_ns() -> u64 {
    PROCESS_EPOCH.elapsed().as_nanos() as u64
}

/// Current wall-clock time in Unix milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
