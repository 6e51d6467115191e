//! The set of chains the platform scans.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A supported blockchain network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Ethereum, Chain::Bsc, Chain::Polygon];

    pub fn slug(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Bsc => "bsc",
            Self::Polygon => "polygon",
        }
    }

    /// EIP-155 chain id, as returned by `eth_chainId`.
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => 1,
            Self::Bsc => 56,
            Self::Polygon => 137,
        }
    }

    /// Environment variables for the primary endpoint, first match wins.
    pub fn primary_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Ethereum => &["ETHEREUM_RPC_URL", "ETH_RPC_URL"],
            Self::Bsc => &["BSC_RPC_URL"],
            Self::Polygon => &["POLYGON_RPC_URL"],
        }
    }

    /// Environment variable for the backup endpoint.
    pub fn backup_env_var(&self) -> &'static str {
        match self {
            Self::Ethereum => "ETHEREUM_RPC_URL_BACKUP",
            Self::Bsc => "BSC_RPC_URL_BACKUP",
            Self::Polygon => "POLYGON_RPC_URL_BACKUP",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Chain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Self::Ethereum),
            "bsc" | "bnb" | "binance" => Ok(Self::Bsc),
            "polygon" | "matic" => Ok(Self::Polygon),
            _ => Err(ConfigError::UnknownChain(s.to_string())),
        }
    }
}
