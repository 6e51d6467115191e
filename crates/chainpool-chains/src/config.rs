//! Pool configuration, from a JSON file or from environment variables.
//!
//! ```json
//! {
//!   "pool": { "health_check_interval_secs": 60, "circuit_breaker_threshold": 5 },
//!   "chains": {
//!     "ethereum": ["https://eth-mainnet.g.alchemy.com/v2/KEY", "https://ethereum.publicnode.com"],
//!     "polygon":  ["https://polygon-rpc.com"]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chainpool_core::PoolConfig;

use crate::chain::Chain;
use crate::error::ConfigError;

pub const ENV_HEALTH_CHECK_INTERVAL: &str = "RPC_POOL_HEALTH_CHECK_INTERVAL_SECS";
pub const ENV_CIRCUIT_BREAKER_THRESHOLD: &str = "RPC_POOL_CIRCUIT_BREAKER_THRESHOLD";
pub const ENV_CIRCUIT_BREAKER_TIMEOUT: &str = "RPC_POOL_CIRCUIT_BREAKER_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "RPC_POOL_MAX_RETRIES";

/// Settings shared by every chain's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// Consecutive failures before a provider's circuit opens.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    /// Cool-down before an open circuit is retried.
    #[serde(default = "default_circuit_breaker_timeout_secs")]
    pub circuit_breaker_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_health_check_interval_secs() -> u64 { 60 }
fn default_circuit_breaker_threshold() -> u32 { 5 }
fn default_circuit_breaker_timeout_secs() -> u64 { 300 }
fn default_max_retries() -> u32 { 3 }

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval_secs(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout_secs: default_circuit_breaker_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl PoolSettings {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_health_check_interval(Duration::from_secs(self.health_check_interval_secs))
            .with_failure_threshold(self.circuit_breaker_threshold)
            .with_open_duration(Duration::from_secs(self.circuit_breaker_timeout_secs))
            .with_max_retries(self.max_retries)
    }

    /// Reject settings no pool can be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "circuit_breaker_threshold".into(),
                value: "0".into(),
            });
        }
        if self.health_check_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "health_check_interval_secs".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Endpoints per chain plus shared pool settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainsConfig {
    #[serde(default)]
    pub pool: PoolSettings,
    /// chain → endpoints in priority order
    #[serde(default)]
    pub chains: BTreeMap<Chain, Vec<String>>,
}

impl ChainsConfig {
    /// Read endpoints and settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable lookup.
    ///
    /// Per chain the primary endpoint comes first, then the backup. Unset or
    /// blank variables are skipped; a chain with no endpoints is left out.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut chains = BTreeMap::new();
        for chain in Chain::ALL {
            let primary = chain.primary_env_vars().iter().find_map(|&key| non_blank(key));
            let backup = non_blank(chain.backup_env_var());
            let endpoints: Vec<String> = primary.into_iter().chain(backup).collect();
            if !endpoints.is_empty() {
                chains.insert(chain, endpoints);
            }
        }

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            health_check_interval_secs: parse_env(
                &non_blank,
                ENV_HEALTH_CHECK_INTERVAL,
                defaults.health_check_interval_secs,
            )?,
            circuit_breaker_threshold: parse_env(
                &non_blank,
                ENV_CIRCUIT_BREAKER_THRESHOLD,
                defaults.circuit_breaker_threshold,
            )?,
            circuit_breaker_timeout_secs: parse_env(
                &non_blank,
                ENV_CIRCUIT_BREAKER_TIMEOUT,
                defaults.circuit_breaker_timeout_secs,
            )?,
            max_retries: parse_env(&non_blank, ENV_MAX_RETRIES, defaults.max_retries)?,
        };

        let config = Self { pool, chains };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the pool settings and that every listed chain has an endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        for (chain, endpoints) in &self.chains {
            if endpoints.iter().all(|e| e.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("chains.{chain}"),
                    value: "no endpoints".into(),
                });
            }
        }
        Ok(())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Endpoints for `chain`, empty if none are configured.
    pub fn endpoints(&self, chain: Chain) -> &[String] {
        self.chains.get(&chain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the endpoints for `chain`.
    pub fn with_endpoints(mut self, chain: Chain, endpoints: Vec<String>) -> Self {
        self.chains.insert(chain, endpoints);
        self
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}
