//! Monotonic, wall-clock-free nanosecond timestamps (§4.B "Time source").
//!
//! A process-startup baseline (`std::time::Instant`) is captured once; every
//! timestamp handed out is nanoseconds elapsed since that baseline, which
//! comfortably fits a `u64` for any realistic process lifetime and is used
//! both by the response cache (`stored_at`/`stale_at`/`retrieved_at`) and by
//! the connection table (`added_at`).

use std::time::Instant;

#[derive(Debug)]
pub struct Clock {
    baseline: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            baseline: Instant::now(),
        }
    }

    pub fn now_ns(&self) -> u64 {
        self.baseline.elapsed().as_nanos() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
