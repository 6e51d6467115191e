//! Per-chain pool registry.
//!
//! The service builds one [`ChainPools`] at startup and hands it (or an `Arc`
//! of it) to whatever needs RPC access; there is no process-wide pool map.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use chainpool_core::{PoolStatus, RpcPool, RpcTransport};
use chainpool_http::{HttpTransport, HttpTransportConfig};

use crate::chain::Chain;
use crate::config::ChainsConfig;
use crate::error::ConfigError;

/// One [`RpcPool`] per configured chain.
#[derive(Debug, Default)]
pub struct ChainPools {
    pools: BTreeMap<Chain, Arc<RpcPool>>,
}

impl ChainPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP pools for every chain in `config`, sharing one HTTP client.
    pub fn from_config(config: &ChainsConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(HttpTransportConfig::default())
            .map_err(|e| ConfigError::InvalidValue {
                key: "http client".into(),
                value: e.to_string(),
            })?;
        Self::from_config_with_transport(config, Arc::new(transport))
    }

    /// Build pools over an arbitrary transport.
    ///
    /// Fails on the first chain whose pool cannot be built.
    pub fn from_config_with_transport(
        config: &ChainsConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, ConfigError> {
        let pool_config = config.pool.to_pool_config();
        let mut pools = Self::new();
        for (chain, endpoints) in &config.chains {
            let pool = RpcPool::new(endpoints.clone(), pool_config.clone(), Arc::clone(&transport))
                .map_err(|e| {
                    tracing::error!(%chain, error = %e, "failed to create RPC pool");
                    e
                })?;
            tracing::info!(%chain, providers = endpoints.len(), "RPC pool configured");
            pools.insert(*chain, pool);
        }
        Ok(pools)
    }

    /// Register (or replace) the pool for `chain`.
    pub fn insert(&mut self, chain: Chain, pool: RpcPool) -> Option<Arc<RpcPool>> {
        self.pools.insert(chain, Arc::new(pool))
    }

    pub fn get(&self, chain: Chain) -> Option<&Arc<RpcPool>> {
        self.pools.get(&chain)
    }

    /// Like [`get`](Self::get), but a missing chain is an error.
    pub fn require(&self, chain: Chain) -> Result<&Arc<RpcPool>, ConfigError> {
        self.get(chain).ok_or(ConfigError::ChainNotConfigured(chain))
    }

    /// Configured chains, in declaration order.
    pub fn chains(&self) -> impl Iterator<Item = Chain> + '_ {
        self.pools.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Start every pool's health-check task.
    pub fn start_all(&self) {
        for (chain, pool) in &self.pools {
            pool.start();
            tracing::info!(%chain, "RPC pool started");
        }
    }

    /// Stop every pool's health-check task, waiting for all of them.
    pub async fn stop_all(&self) {
        join_all(self.pools.values().map(|pool| pool.stop())).await;
        tracing::info!(chains = self.pools.len(), "RPC pools stopped");
    }

    /// Status snapshot of every pool.
    pub fn status(&self) -> BTreeMap<Chain, PoolStatus> {
        self.pools
            .iter()
            .map(|(chain, pool)| (*chain, pool.status()))
            .collect()
    }
}
