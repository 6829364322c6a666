//! Exponential backoff for failed publish attempts

use rand::Rng;
use std::time::Duration;

/// Retry ceiling and backoff curve applied by the worker
///
/// The delay before attempt `r + 1` is `min(cap, base * 2^r)` plus a uniform
/// jitter in `[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_millis(15_000),
            cap: Duration::from_millis(300_000),
            jitter: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Whether a post that has already failed `retry_count` times may retry
    pub fn can_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// Delay before the next attempt, without jitter
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Delay before the next attempt, jittered
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.base_delay(retry_count) + Duration::from_millis(jitter)
    }
}
