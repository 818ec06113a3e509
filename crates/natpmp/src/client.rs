//! Typed Client
//!
//! Wraps an [`RpcClient`] with the four exported NAT-PMP methods.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use natpmp_types::{NatPmpConfig, NatPmpStatus};
use plugin_host::{RpcClient, RpcError, RpcResult};

use crate::daemon::{GET_CONFIG, GET_STATUS, IS_COMMAND_VALID, SET_CONFIG};

#[derive(Clone)]
pub struct NatPmpClient {
    rpc: Arc<dyn RpcClient>,
}

impl NatPmpClient {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }

    pub async fn get_config(&self) -> RpcResult<NatPmpConfig> {
        let value = self.rpc.call(GET_CONFIG, vec![]).await?;
        decode(value)
    }

    /// Submit a full configuration record
    pub async fn set_config(&self, config: &NatPmpConfig) -> RpcResult<()> {
        let params = serde_json::to_value(config).map_err(|e| RpcError::Decode(e.to_string()))?;
        self.rpc.call(SET_CONFIG, vec![params]).await?;
        Ok(())
    }

    pub async fn get_status(&self) -> RpcResult<NatPmpStatus> {
        let value = self.rpc.call(GET_STATUS, vec![]).await?;
        decode(value)
    }

    pub async fn is_command_valid(&self, command: &str) -> RpcResult<bool> {
        let value = self
            .rpc
            .call(IS_COMMAND_VALID, vec![Value::String(command.to_string())])
            .await?;
        decode(value)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> RpcResult<T> {
    serde_json::from_value(value).map_err(|e| RpcError::Decode(e.to_string()))
}
