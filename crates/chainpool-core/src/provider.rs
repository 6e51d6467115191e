//! Provider records and their reportable status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Endpoint length kept in status reports; URLs usually carry an API key in
/// the path.
const REPORT_ENDPOINT_LEN: usize = 50;
/// Endpoint length kept in log lines.
const LOG_ENDPOINT_LEN: usize = 30;

/// Status of one upstream RPC provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Last probe or call succeeded.
    Healthy,
    /// Recent failures, still below the circuit threshold.
    Degraded,
    /// Reporting-only variant; selected exactly like `Degraded`.
    Failed,
    /// Too many consecutive failures; rejected until the cool-down passes.
    CircuitOpen,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
            Self::CircuitOpen => write!(f, "circuit_open"),
        }
    }
}

/// One configured endpoint and its failure-tracking state.
///
/// Only the pool mutates these; callers see [`ProviderSnapshot`]s.
#[derive(Debug, Clone)]
pub struct Provider {
    pub(crate) endpoint: String,
    pub(crate) priority: u32,
    pub(crate) status: ProviderStatus,
    pub(crate) failure_count: u32,
    pub(crate) last_checked_at: Option<DateTime<Utc>>,
    pub(crate) circuit_open_until: Option<Instant>,
}

impl Provider {
    pub(crate) fn new(endpoint: impl Into<String>, priority: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            priority,
            status: ProviderStatus::Healthy,
            failure_count: 0,
            last_checked_at: None,
            circuit_open_until: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn status(&self) -> ProviderStatus {
        self.status
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked_at
    }

    pub fn circuit_open_until(&self) -> Option<Instant> {
        self.circuit_open_until
    }

    /// Shortened endpoint for log lines.
    pub(crate) fn log_label(&self) -> &str {
        truncate_chars(&self.endpoint, LOG_ENDPOINT_LEN)
    }

    pub(crate) fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            endpoint: report_endpoint(&self.endpoint),
            priority: self.priority,
            status: self.status,
            failure_count: self.failure_count,
            last_checked_at: self.last_checked_at,
        }
    }
}

/// Point-in-time copy of a provider, as returned by
/// [`RpcPool::status`](crate::pool::RpcPool::status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub endpoint: String,
    pub priority: u32,
    pub status: ProviderStatus,
    pub failure_count: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Endpoint as shown in status reports: at most 50 characters, with a `...`
/// suffix when cut.
pub fn report_endpoint(endpoint: &str) -> String {
    let cut = truncate_chars(endpoint, REPORT_ENDPOINT_LEN);
    if cut.len() < endpoint.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
