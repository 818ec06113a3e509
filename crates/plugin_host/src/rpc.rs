//! Remote Calls
//!
//! Plugins reach their core component through [`RpcClient`]. Requests and
//! responses use the host's JSON-RPC shape:
//!
//! ```text
//! -> {"method": "natpmp.get_config", "params": [], "id": 1}
//! <- {"result": {...}, "error": null, "id": 1}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// RPC Error
// ─────────────────────────────────────────────────────────────────────────────

/// Error code for a method the server does not export
pub const CODE_UNKNOWN_METHOD: i64 = 1;
/// Error code for params that do not fit the method
pub const CODE_INVALID_PARAMS: i64 = 2;
/// Error code for a failure inside the method
pub const CODE_CALL_FAILED: i64 = 3;

/// Errors that can occur during a remote call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },

    #[error("Call failed ({code}): {message}")]
    CallFailed { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode result: {0}")]
    Decode(String),
}

impl RpcError {
    /// Wire error code for this error
    pub fn code(&self) -> i64 {
        match self {
            RpcError::UnknownMethod(_) => CODE_UNKNOWN_METHOD,
            RpcError::InvalidParams { .. } => CODE_INVALID_PARAMS,
            RpcError::CallFailed { code, .. } => *code,
            RpcError::Transport(_) | RpcError::Decode(_) => CODE_CALL_FAILED,
        }
    }

    /// Build an invalid-params error
    pub fn invalid_params(method: impl Into<String>, message: impl ToString) -> Self {
        RpcError::InvalidParams {
            method: method.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for remote calls
pub type RpcResult<T> = Result<T, RpcError>;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    pub id: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: impl Into<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// Error body of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub message: String,
    pub code: i64,
}

/// A JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: Value,
    pub error: Option<RpcErrorBody>,
    pub id: Value,
}

impl RpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            result,
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn failure(id: Value, error: &RpcError) -> Self {
        Self {
            result: Value::Null,
            error: Some(RpcErrorBody {
                message: error.to_string(),
                code: error.code(),
            }),
            id,
        }
    }

    /// Build a response from the outcome of a call
    pub fn from_result(id: Value, result: RpcResult<Value>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::failure(id, &e),
        }
    }

    /// Convert back into the outcome of the call
    pub fn into_result(self) -> RpcResult<Value> {
        match self.error {
            None => Ok(self.result),
            Some(body) => Err(RpcError::CallFailed {
                code: body.code,
                message: body.message,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RPC Client
// ─────────────────────────────────────────────────────────────────────────────

/// A client able to invoke methods exported by a core component
///
/// Calls resolve on the caller's task; a transport failure is returned as
/// an error rather than dropped.
#[async_trait]
pub trait RpcClient: Send + Sync + 'static {
    /// Invoke `method` with positional `params`
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value>;
}
