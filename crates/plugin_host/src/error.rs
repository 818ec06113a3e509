use crate::rpc::RpcError;

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by the host surface
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Plugin already registered: {0}")]
    PluginExists(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Preferences page already added: {0}")]
    PageExists(String),

    #[error("Preferences page not found: {0}")]
    PageNotFound(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Page '{title}' failed: {message}")]
    Page { title: String, message: String },
}
