//! chainpool-chains — typed chain registry for ChainPool.
//!
//! Services own a [`ChainPools`] built from [`ChainsConfig`] at startup and
//! look pools up by [`Chain`], never by free-form string.
//!
//! # Quick start
//! ```rust,no_run
//! use chainpool_chains::{Chain, ChainPools, ChainsConfig};
//!
//! # async fn run() -> Result<(), chainpool_chains::ConfigError> {
//! let pools = ChainPools::from_config(&ChainsConfig::from_env()?)?;
//! pools.start_all();
//! let block = pools.require(Chain::Ethereum)?.get_block_number().await?;
//! println!("ethereum at block {block}");
//! pools.stop_all().await;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod registry;

pub use chain::Chain;
pub use config::{ChainsConfig, PoolSettings};
pub use error::ConfigError;
pub use registry::ChainPools;
