//! Emission-time source for messages stamped at publish time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// Wall clock (seconds since the Unix epoch).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Clock frozen at a fixed time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now_secs(&self) -> f64 {
        self.0
    }
}
