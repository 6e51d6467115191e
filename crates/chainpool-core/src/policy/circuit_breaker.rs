//! Per-provider circuit breaker.
//!
//! State transitions:
//! - `Healthy`/`Degraded` → `Degraded`:     failure, count still below `failure_threshold`
//! - `Healthy`/`Degraded` → `CircuitOpen`:  failure, count reaches `failure_threshold`
//! - `CircuitOpen` → `Degraded`:            availability check after `open_duration` elapsed
//! - any → `Healthy`:                       successful probe or call
//!
//! The half-open transition is lazy: it happens inside [`CircuitBreaker::is_available`]
//! rather than on a timer, so every transition is reachable from the pool's
//! selection path under a single lock.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::provider::{Provider, ProviderStatus};

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening.
    pub failure_threshold: u32,
    /// How long an open circuit rejects the provider.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(300),
        }
    }
}

/// Applies circuit-breaker transitions to [`Provider`] records.
///
/// Holds no state of its own; callers serialise access to the providers.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Record a failed probe or call.
    pub fn on_failure(&self, provider: &mut Provider, now: Instant) {
        provider.failure_count = provider.failure_count.saturating_add(1);
        provider.last_checked_at = Some(Utc::now());

        if provider.failure_count >= self.config.failure_threshold {
            provider.status = ProviderStatus::CircuitOpen;
            provider.circuit_open_until = Some(now + self.config.open_duration);
            tracing::error!(
                endpoint = %provider.log_label(),
                failures = provider.failure_count,
                open_secs = self.config.open_duration.as_secs(),
                "circuit breaker → open"
            );
        } else {
            provider.status = ProviderStatus::Degraded;
            tracing::warn!(
                endpoint = %provider.log_label(),
                failures = provider.failure_count,
                threshold = self.config.failure_threshold,
                "provider degraded"
            );
        }
    }

    /// Record a successful probe or call.
    pub fn on_success(&self, provider: &mut Provider) {
        if provider.status != ProviderStatus::Healthy {
            tracing::info!(endpoint = %provider.log_label(), "provider recovered → healthy");
        }
        provider.status = ProviderStatus::Healthy;
        provider.failure_count = 0;
        provider.circuit_open_until = None;
        provider.last_checked_at = Some(Utc::now());
    }

    /// Returns `true` if the provider may take new calls.
    ///
    /// An open circuit whose cool-down has elapsed is demoted to `Degraded`
    /// as a side effect.
    pub fn is_available(&self, provider: &mut Provider, now: Instant) -> bool {
        match provider.status {
            ProviderStatus::Healthy | ProviderStatus::Degraded | ProviderStatus::Failed => true,
            ProviderStatus::CircuitOpen => {
                if matches!(provider.circuit_open_until, Some(until) if now < until) {
                    return false;
                }
                provider.status = ProviderStatus::Degraded;
                tracing::info!(endpoint = %provider.log_label(), "circuit breaker → half-open");
                true
            }
        }
    }

    /// Forcibly half-open a circuit when every provider is down.
    ///
    /// Leaves the provider one failure short of the threshold, so a single
    /// further miss re-opens it.
    pub fn force_half_open(&self, provider: &mut Provider) {
        if provider.status == ProviderStatus::CircuitOpen {
            provider.status = ProviderStatus::Degraded;
            provider.failure_count = self.config.failure_threshold.saturating_sub(1);
        }
    }
}
