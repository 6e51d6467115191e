//! Exponential backoff between failover attempts.

use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per call, across providers.
    pub max_retries: u32,
    /// Sleep after the first failed attempt.
    pub initial_backoff: Duration,
    /// Multiplier applied to the sleep on each further attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Stateless retry policy: computes the sleep after a failed attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the sleep after the 0-based `attempt` failed, out of `attempts`
    /// total. Returns `None` after the final attempt.
    pub fn backoff(&self, attempt: u32, attempts: u32) -> Option<Duration> {
        if attempt + 1 >= attempts {
            return None;
        }
        let factor = self.config.multiplier.powi(attempt as i32);
        Some(self.config.initial_backoff.mul_f64(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
