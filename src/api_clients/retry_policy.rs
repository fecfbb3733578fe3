use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};

/// Bounded exponential backoff applied uniformly to every request.
///
/// Only connectivity failures and 5xx responses are retried; auth handling
/// never goes through this policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_API_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Whether attempt number `attempt` (0-based, counting retries already made)
    /// may be followed by another.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retry `attempt` (0-based): `base * 2^attempt`, capped at
    /// `max_delay`, plus up to 10% jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let exp_delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || exp_delay.is_zero() {
            return exp_delay;
        }
        let jitter_ms = (exp_delay.as_millis() as u64 / 10).max(1);
        let extra = rand::rng().random_range(0..=jitter_ms);
        (exp_delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}
