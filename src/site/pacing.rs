//! Human-like pacing between page interactions.

use rand::RngExt;
use std::time::Duration;
use tracing::debug;

/// Politeness delay applied before page interactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacer {
    delay_ms: u64,
    jitter_ms: u64,
}

impl Pacer {
    /// Creates a pacer with a base delay and a random jitter upper bound.
    pub fn new(delay_ms: u64, jitter_ms: u64) -> Self {
        Self { delay_ms, jitter_ms }
    }

    /// A pacer that never waits.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if this pacer never waits.
    pub fn is_disabled(&self) -> bool {
        self.delay_ms == 0 && self.jitter_ms == 0
    }

    /// Picks the next delay: base plus uniform jitter.
    pub fn next_delay(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(self.delay_ms + jitter)
    }

    /// Sleeps for the next delay.
    pub async fn pause(&self) {
        if self.is_disabled() {
            return;
        }

        let delay = self.next_delay();
        debug!("Pausing {}ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
