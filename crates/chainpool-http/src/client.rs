//! HTTP JSON-RPC transport backed by `reqwest`.
//!
//! One `reqwest::Client` is shared by every provider in a pool, so keep-alive
//! connections are reused across calls and probes. Deadlines are set per
//! request: 30s for calls, 5s for health probes by default.

use std::time::Duration;

use async_trait::async_trait;

use chainpool_core::error::TransportError;
use chainpool_core::request::{JsonRpcRequest, JsonRpcResponse};
use chainpool_core::transport::RpcTransport;

/// Longest error body kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// TCP connect timeout, applied on top of the per-request deadline.
    pub connect_timeout: Duration,
    /// Idle keep-alive connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 8,
            user_agent: concat!("chainpool/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// HTTP JSON-RPC transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an existing client, e.g. one shared with the rest of a service.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post(
        &self,
        endpoint: &str,
        req: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<reqwest::Response, TransportError> {
        let resp = self
            .http
            .post(endpoint)
            .timeout(timeout)
            .json(req)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let mut body = resp.text().await.unwrap_or_default();
            truncate_body(&mut body);
            return Err(TransportError::Status { code, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        req: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse, TransportError> {
        let resp = self.post(endpoint, req, timeout).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let parsed = serde_json::from_slice::<JsonRpcResponse>(&bytes)?;
        tracing::trace!(method = %req.method, ok = parsed.error.is_none(), "JSON-RPC response");
        Ok(parsed)
    }

    async fn probe(
        &self,
        endpoint: &str,
        req: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.post(endpoint, req, timeout).await.map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            ms: timeout.as_millis() as u64,
        }
    } else {
        TransportError::Http(err.to_string())
    }
}

fn truncate_body(body: &mut String) {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
}
