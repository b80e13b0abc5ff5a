use std::time::Instant;

use crate::data::Eta;

/// Transfer speed from the two most recent samples.
#[derive(Debug, Clone)]
pub struct RateMeter {
    last: (Instant, u64),
    speed: f64,
}

impl RateMeter {
    pub fn new(at: Instant, bytes: u64) -> Self {
        Self {
            last: (at, bytes),
            speed: 0.0,
        }
    }

    /// Record `bytes` received so far at `at` and return bytes per second
    /// since the previous sample. A zero interval keeps the previous speed.
    pub fn sample(&mut self, at: Instant, bytes: u64) -> f64 {
        let (prev_at, prev_bytes) = self.last;
        let dt = at.saturating_duration_since(prev_at).as_secs_f64();
        if dt > 0.0 {
            self.speed = bytes.saturating_sub(prev_bytes) as f64 / dt;
        }
        self.last = (at, bytes);
        self.speed
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

/// Remaining time at `speed` bytes per second, or `None` while stalled.
pub fn estimate_eta(remaining: u64, speed: f64) -> Option<Eta> {
    (speed > 0.0).then(|| Eta::from_secs(remaining as f64 / speed))
}
