//! chainpool-http — HTTP transport for ChainPool.
//!
//! # Quick start
//! ```rust,no_run
//! use chainpool_core::PoolConfig;
//!
//! # async fn run() -> Result<(), chainpool_core::PoolError> {
//! let pool = chainpool_http::pool(
//!     vec![
//!         "https://eth-mainnet.g.alchemy.com/v2/KEY".into(),
//!         "https://ethereum.publicnode.com".into(),
//!     ],
//!     PoolConfig::default(),
//! )?;
//! pool.start();
//! let block = pool.get_block_number().await?;
//! println!("block {block}");
//! pool.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod client;

use std::sync::Arc;

use chainpool_core::{PoolConfig, PoolError, RpcPool};

pub use client::{HttpTransport, HttpTransportConfig};

/// Build an [`RpcPool`] over a fresh [`HttpTransport`] with default settings.
pub fn pool(endpoints: Vec<String>, config: PoolConfig) -> Result<RpcPool, PoolError> {
    let transport = HttpTransport::new(HttpTransportConfig::default())
        .map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
    pool_with_transport(endpoints, config, transport)
}

/// Build an [`RpcPool`] over an existing transport, sharing its connections.
pub fn pool_with_transport(
    endpoints: Vec<String>,
    config: PoolConfig,
    transport: HttpTransport,
) -> Result<RpcPool, PoolError> {
    RpcPool::new(endpoints, config, Arc::new(transport))
}
