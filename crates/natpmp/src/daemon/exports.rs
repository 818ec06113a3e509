//! Exported Methods
//!
//! The core's remote surface: `natpmp.get_config`, `natpmp.set_config`,
//! `natpmp.get_status` and `natpmp.is_command_valid`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use natpmp_types::NatPmpConfigPatch;
use plugin_host::{RpcClient, RpcError, RpcRequest, RpcResponse, RpcResult, CODE_CALL_FAILED};

use super::plugin::NatPmpCore;
use crate::error::Error;

pub const GET_CONFIG: &str = "natpmp.get_config";
pub const SET_CONFIG: &str = "natpmp.set_config";
pub const GET_STATUS: &str = "natpmp.get_status";
pub const IS_COMMAND_VALID: &str = "natpmp.is_command_valid";

/// Dispatches remote calls onto a [`NatPmpCore`]
#[derive(Clone)]
pub struct CoreExports {
    core: NatPmpCore,
}

impl CoreExports {
    pub fn new(core: NatPmpCore) -> Self {
        Self { core }
    }

    /// Handle a wire request
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let result = self.call(&request.method, request.params).await;
        RpcResponse::from_result(request.id, result)
    }
}

#[async_trait]
impl RpcClient for CoreExports {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        debug!(method, "RPC call");

        match method {
            GET_CONFIG => {
                expect_arity(method, &params, 0)?;
                to_value(method, &self.core.get_config())
            }
            SET_CONFIG => {
                expect_arity(method, &params, 1)?;
                let patch: NatPmpConfigPatch = param(method, &params[0])?;
                self.core
                    .set_config(patch)
                    .await
                    .map_err(|e| call_error(method, e))?;
                Ok(Value::Null)
            }
            GET_STATUS => {
                expect_arity(method, &params, 0)?;
                to_value(method, &self.core.get_status())
            }
            IS_COMMAND_VALID => {
                expect_arity(method, &params, 1)?;
                let command: String = param(method, &params[0])?;
                Ok(Value::Bool(self.core.is_command_valid(&command)))
            }
            _ => Err(RpcError::UnknownMethod(method.to_string())),
        }
    }
}

fn expect_arity(method: &str, params: &[Value], expected: usize) -> RpcResult<()> {
    if params.len() != expected {
        return Err(RpcError::invalid_params(
            method,
            format!("expected {} params, got {}", expected, params.len()),
        ));
    }
    Ok(())
}

fn param<T: DeserializeOwned>(method: &str, value: &Value) -> RpcResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| RpcError::invalid_params(method, e))
}

fn to_value<T: serde::Serialize>(method: &str, value: &T) -> RpcResult<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::CallFailed {
        code: CODE_CALL_FAILED,
        message: format!("{}: {}", method, e),
    })
}

fn call_error(method: &str, err: Error) -> RpcError {
    match err {
        Error::Validation(e) => RpcError::invalid_params(method, e),
        other => RpcError::CallFailed {
            code: CODE_CALL_FAILED,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::{ConfigStore, MemorySession, ProcessRunner};
    use serde_json::json;
    use std::sync::Arc;

    async fn exports_in(dir: &std::path::Path) -> CoreExports {
        let store = ConfigStore::open(dir).await.unwrap();
        let core = NatPmpCore::new(store, Arc::new(MemorySession::new(6881)), Arc::new(ProcessRunner));
        CoreExports::new(core)
    }

    #[tokio::test]
    async fn test_get_config_returns_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let config = exports.call(GET_CONFIG, vec![]).await.unwrap();
        let object = config.as_object().unwrap();
        assert_eq!(object.len(), 9);
        assert_eq!(object["gateway_address"], "10.2.0.1");
        assert_eq!(object["preffered_public_port"], 1);
    }

    #[tokio::test]
    async fn test_set_config_partial_patch() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let result = exports
            .call(SET_CONFIG, vec![json!({"timeout": 5})])
            .await
            .unwrap();
        assert_eq!(result, Value::Null);

        let config = exports.call(GET_CONFIG, vec![]).await.unwrap();
        assert_eq!(config["timeout"], 5);
        assert_eq!(config["refresh_interval"], 45);
    }

    #[tokio::test]
    async fn test_set_config_rejects_bad_params() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let unknown_key = exports.call(SET_CONFIG, vec![json!({"colour": "red"})]).await;
        assert!(matches!(unknown_key, Err(RpcError::InvalidParams { .. })));

        let out_of_range = exports
            .call(SET_CONFIG, vec![json!({"lifetime_interval": 90_000})])
            .await;
        assert!(matches!(out_of_range, Err(RpcError::InvalidParams { .. })));

        let missing = exports.call(SET_CONFIG, vec![]).await;
        assert!(matches!(missing, Err(RpcError::InvalidParams { .. })));
    }

    #[tokio::test]
    async fn test_is_command_valid() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let result = exports
            .call(IS_COMMAND_VALID, vec![json!("/nonexistent/natpmpc")])
            .await
            .unwrap();
        assert_eq!(result, json!(false));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let response = exports
            .dispatch(RpcRequest::new("natpmp.reboot", vec![], 9))
            .await;
        assert_eq!(response.id, json!(9));
        let error = response.error.unwrap();
        assert_eq!(error.code, plugin_host::CODE_UNKNOWN_METHOD);
    }

    #[tokio::test]
    async fn test_get_status_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let exports = exports_in(dir.path()).await;

        let status = exports.call(GET_STATUS, vec![]).await.unwrap();
        assert_eq!(
            status,
            json!({"last_update": "", "public_ip_address": "", "current_port": ""})
        );
    }
}
