//! Backoff policy: per-outcome retry decision with randomized waits.
//!
//! Only throttling and transient failures are retried. Waits are drawn
//! uniformly from a per-kind window so concurrently scheduled symbols do not
//! retry in lockstep.

use std::time::Duration;

use barsync_core::data::OutcomeKind;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive range of milliseconds to draw a wait from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWindow {
    pub min: u64,
    pub max: u64,
}

impl WaitWindow {
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// A window that always yields zero.
    pub const fn none() -> Self {
        Self { min: 0, max: 0 }
    }

    /// Draw a wait uniformly from `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return Duration::from_millis(self.min);
        }
        Duration::from_millis(rng.gen_range(self.min..=self.max))
    }

    pub fn contains(&self, wait: Duration) -> bool {
        let ms = wait.as_millis();
        ms >= u128::from(self.min) && ms <= u128::from(self.max)
    }
}

/// What to do after a classified fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub retry: bool,
    pub wait: Duration,
}

impl Decision {
    /// Terminal: return without waiting.
    pub const fn stop() -> Self {
        Self {
            retry: false,
            wait: Duration::ZERO,
        }
    }
}

/// Retry budget and wait windows per retryable outcome kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub rate_limited: WaitWindow,
    pub transient: WaitWindow,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limited: WaitWindow::from_millis(5_000, 10_000),
            transient: WaitWindow::from_millis(2_000, 4_000),
        }
    }
}

impl BackoffPolicy {
    /// Decide whether attempt `attempt_index` (zero-based) should be followed by another.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        kind: OutcomeKind,
        attempt_index: u32,
        rng: &mut R,
    ) -> Decision {
        let window = match kind {
            OutcomeKind::Success | OutcomeKind::NotFound | OutcomeKind::NoData => {
                return Decision::stop()
            }
            OutcomeKind::RateLimited => self.rate_limited,
            OutcomeKind::TransientError => self.transient,
        };

        if attempt_index.saturating_add(1) < self.max_attempts {
            Decision {
                retry: true,
                wait: window.sample(rng),
            }
        } else {
            Decision::stop()
        }
    }
}
