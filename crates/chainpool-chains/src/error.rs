//! Configuration and registry errors.

use thiserror::Error;

use chainpool_core::PoolError;

use crate::chain::Chain;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown chain '{0}' (expected one of: ethereum, bsc, polygon)")]
    UnknownChain(String),

    #[error("no RPC pool configured for {0}")]
    ChainNotConfigured(Chain),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
