//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Every request the pool emits carries this id; calls are never multiplexed.
pub const REQUEST_ID: u64 = 1;

/// JSON-RPC response id: string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl Default for RpcId {
    fn default() -> Self {
        Self::Null
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: REQUEST_ID,
        }
    }

    /// The lightweight liveness probe sent by the health-check loop.
    pub fn block_number_probe() -> Self {
        Self::new("eth_blockNumber", vec![])
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A JSON-RPC 2.0 response.
///
/// Lenient on the envelope: nodes in the wild omit `jsonrpc` or echo odd ids,
/// and neither matters to the pool. Strict on `error`: any top-level `error`
/// key marks the response as failed, even `"error": null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(
        default,
        deserialize_with = "error_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<JsonRpcError>,
}

/// Only called when the key is present, so every value maps to `Some`.
fn error_key<'de, D: Deserializer<'de>>(d: D) -> Result<Option<JsonRpcError>, D::Error> {
    let raw = Value::deserialize(d)?;
    let err = match raw {
        Value::Null => JsonRpcError {
            code: 0,
            message: "null error".into(),
            data: None,
        },
        other => match serde_json::from_value::<JsonRpcError>(other.clone()) {
            Ok(err) => err,
            Err(_) => JsonRpcError {
                code: 0,
                message: other.to_string(),
                data: Some(other),
            },
        },
    };
    Ok(Some(err))
}

impl JsonRpcResponse {
    /// Build a successful response; mostly useful for transports and tests.
    pub fn success(result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(REQUEST_ID),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(REQUEST_ID),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Unwrap the result value or return the node's error.
    ///
    /// A response with neither field yields `Value::Null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}
