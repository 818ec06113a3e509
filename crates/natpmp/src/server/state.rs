//! Server Application State

use std::sync::Arc;

use plugin_host::service::ServiceManager;

use crate::daemon::CoreExports;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Dispatcher for exported core methods
    exports: CoreExports,

    /// Service manager
    service_manager: Arc<ServiceManager>,
}

impl AppState {
    pub fn new(exports: CoreExports, service_manager: Arc<ServiceManager>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                exports,
                service_manager,
            }),
        }
    }

    pub fn exports(&self) -> &CoreExports {
        &self.inner.exports
    }

    pub fn service_manager(&self) -> &Arc<ServiceManager> {
        &self.inner.service_manager
    }
}
