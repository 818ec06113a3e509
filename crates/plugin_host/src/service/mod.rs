//! Core Services
//!
//! Long-running components on the core side of a plugin, such as a timer
//! that periodically renews a port mapping.
//!
//! # Lifecycle
//!
//! - `on_start`: called once when the service is spawned
//! - `on_tick`: called every `tick_interval`; the interval can be replaced or
//!   cleared at runtime through [`ServiceHandle::set_tick_interval`]
//! - `on_stop`: called once on shutdown, bounded by `shutdown_timeout`

mod handle;
mod manager;

pub use handle::*;
pub use manager::*;

use std::time::Duration;

use async_trait::async_trait;

// ─────────────────────────────────────────────────────────────────────────────
// Service Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from the service lifecycle
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("Service already running: {0}")]
    AlreadyRunning(String),

    #[error("Service not running: {0}")]
    NotRunning(String),

    #[error("Tick failed: {0}")]
    TickFailed(String),

    #[error("Shutdown timeout")]
    ShutdownTimeout,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Service Specification
// ─────────────────────────────────────────────────────────────────────────────

/// Identity and timing of a service
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Key in the [`ServiceManager`] table
    pub id: String,

    /// Name used in logs
    pub name: String,

    /// Initial tick interval; `None` means the service starts idle
    pub tick_interval: Option<Duration>,

    /// Upper bound on `on_stop`
    pub shutdown_timeout: Duration,
}

impl ServiceSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tick_interval: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Tick from the start instead of idling
    pub fn with_tick_interval(mut self, interval: Option<Duration>) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Context
// ─────────────────────────────────────────────────────────────────────────────

/// Passed to every lifecycle hook
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub service_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A long-running service managed by [`ServiceManager`]
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn spec(&self) -> ServiceSpec;

    /// An error here leaves the service failed without ticking
    async fn on_start(&mut self, ctx: &ServiceContext) -> ServiceResult<()>;

    async fn on_stop(&mut self, ctx: &ServiceContext) -> ServiceResult<()>;

    /// Runs once per tick while an interval is set
    async fn on_tick(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_spec_builder() {
        let spec = ServiceSpec::new("natpmp-refresh", "NAT-PMP Refresh")
            .with_tick_interval(Some(Duration::from_secs(45)))
            .with_shutdown_timeout(Duration::from_secs(5));

        assert_eq!(spec.id, "natpmp-refresh");
        assert_eq!(spec.name, "NAT-PMP Refresh");
        assert_eq!(spec.tick_interval, Some(Duration::from_secs(45)));
        assert_eq!(spec.shutdown_timeout, Duration::from_secs(5));
    }
}
