//! Error types for transports and the provider pool.

use thiserror::Error;

use crate::request::JsonRpcError;

/// A failure talking to one provider.
///
/// Every variant is a *provider* failure: the pool absorbs it, records it
/// against the provider and fails over. It only reaches a caller wrapped in
/// [`PoolError::RetriesExhausted`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-2xx status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The request did not complete within its deadline.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The body was not a JSON-RPC response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The node answered with a JSON-RPC `error` object.
    #[error("RPC error: {0}")]
    Rpc(JsonRpcError),
}

impl TransportError {
    /// Returns `true` if the node itself rejected the call (as opposed to the
    /// transport failing to deliver it).
    pub fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` for deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Errors surfaced by [`RpcPool`](crate::pool::RpcPool) to its callers.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was constructed with unusable settings.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// No provider was available, even after forcing open circuits half-open.
    #[error("all {providers} RPC providers unavailable")]
    AllProvidersDown { providers: usize },

    /// Every attempt failed; carries the last provider error.
    #[error("RPC call {method} failed after {attempts} attempts (last provider {endpoint}): {source}")]
    RetriesExhausted {
        method: String,
        attempts: u32,
        endpoint: String,
        #[source]
        source: TransportError,
    },

    /// The call succeeded but the result did not have the expected shape.
    #[error("cannot decode {method} result {value}: {reason}")]
    Decode {
        method: String,
        value: String,
        reason: String,
    },
}

impl PoolError {
    /// Returns `true` if the call never reached a provider.
    pub fn is_selection_failure(&self) -> bool {
        matches!(self, Self::AllProvidersDown { .. })
    }

    /// The last provider error, when the call was attempted at all.
    pub fn last_transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::RetriesExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}
