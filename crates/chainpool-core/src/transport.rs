//! The `RpcTransport` trait — how the pool reaches a provider endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Delivers JSON-RPC envelopes to endpoint URLs.
///
/// One transport serves every provider in a pool; the endpoint is passed per
/// call. Implementations enforce `timeout` themselves.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// POST `req` to `endpoint` and parse the JSON-RPC response.
    ///
    /// Fails on transport errors, non-2xx statuses and non-JSON bodies. A
    /// JSON-RPC `error` object is returned inside `Ok`; classifying it is
    /// the pool's job.
    async fn send(
        &self,
        endpoint: &str,
        req: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse, TransportError>;

    /// POST `req` to `endpoint`; any 2xx status is a success. The body is
    /// not read.
    async fn probe(
        &self,
        endpoint: &str,
        req: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}
