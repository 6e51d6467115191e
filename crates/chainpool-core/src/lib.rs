//! chainpool-core — prioritised, health-checked JSON-RPC provider pool.
//!
//! # Overview
//!
//! A pool owns N endpoints for one chain, ranked by configuration order. Each
//! call goes to the best available endpoint; failures feed a per-provider
//! circuit breaker and the call fails over with exponential backoff. A
//! background task probes every endpoint on a fixed interval.
//!
//! - [`RpcPool`] — selection, failover, health checks, status reports
//! - [`RpcTransport`] — how envelopes reach an endpoint (see `chainpool-http`)
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`PoolError`] / [`TransportError`] — caller-facing and provider-level errors
//! - [`policy`] module — circuit breaker and retry policy

pub mod decode;
pub mod error;
pub mod policy;
pub mod pool;
pub mod provider;
pub mod request;
pub mod transport;

pub use error::{PoolError, TransportError};
pub use pool::{PoolConfig, PoolStatus, RpcPool};
pub use provider::{ProviderSnapshot, ProviderStatus};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;
