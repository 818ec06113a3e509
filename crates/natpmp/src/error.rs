use natpmp_types::{ConfigKey, ValidationError};
use plugin_host::service::ServiceError;
use plugin_host::RpcError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidField { field: ConfigKey, value: String },

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Settings(err.to_string())
    }
}
