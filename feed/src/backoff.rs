//! Reconnect backoff policy.
//!
//! Exponential with jitter, capped at a ceiling, unbounded attempts. The
//! jittered delay is drawn from `[base/2, base]` of the exponential value so
//! that a fleet of reconnecting clients does not thundering-herd the feed.

use std::time::Duration;

use rand::Rng;

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const CEILING: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Delay before the next attempt. Grows 2x per call until the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let exp = INITIAL_DELAY
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(CEILING);
        self.attempt = self.attempt.saturating_add(1);

        let max_ms = exp.as_millis() as u64;
        let min_ms = max_ms / 2;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Called after a successful connect so the next drop starts cheap again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
