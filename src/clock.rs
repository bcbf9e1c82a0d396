//! Time sources for the control loop.
//!
//! Sampling cadence is measured on a monotonic clock so that NTP steps do not
//! cause skipped or doubled samples. Report triggers use the UTC wall clock.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Milliseconds per second
pub const MS_PER_SECOND: u64 = 1000;

/// A reading of both clocks taken at the same tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    /// Monotonic milliseconds since the clock was created
    pub ticks_ms: u64,
    /// UTC wall clock
    pub wall: DateTime<Utc>,
}

/// Clock backed by the tokio monotonic timer and the system time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Moment {
        Moment {
            ticks_ms: self.start.elapsed().as_millis() as u64,
            wall: Utc::now(),
        }
    }
}
