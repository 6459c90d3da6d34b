//! Suspension seam for backoff waits and inter-symbol pacing.

use std::time::Duration;

/// Blocks the calling worker for a duration.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

pub(crate) static THREAD_SLEEPER: ThreadSleeper = ThreadSleeper;
