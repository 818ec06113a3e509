//! Core Plugin State
//!
//! [`NatPmpCore`] is the daemon half of the plugin: it owns the config store,
//! the status record and the refresh timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use natpmp_types::{NatPmpConfig, NatPmpConfigPatch, NatPmpStatus};
use plugin_host::service::{ServiceHandle, ServiceManager};

use super::command::{self, CommandRunner};
use super::refresh::RefreshService;
use super::session::TorrentSession;
use super::store::ConfigStore;
use crate::error::Result;

/// Service id of the refresh timer
pub const REFRESH_SERVICE_ID: &str = "natpmp-refresh";

#[derive(Default)]
struct RefreshTimer {
    handle: Option<ServiceHandle>,
    /// Period the service accepted; `None` while stopped or without a service
    interval: Option<Duration>,
}

struct CoreInner {
    store: ConfigStore,
    status: RwLock<NatPmpStatus>,
    session: Arc<dyn TorrentSession>,
    runner: Arc<dyn CommandRunner>,
    timer: Mutex<RefreshTimer>,
    /// Held across enable, disable and set_config
    config_lock: tokio::sync::Mutex<()>,
}

/// Daemon-side NAT-PMP plugin
#[derive(Clone)]
pub struct NatPmpCore {
    inner: Arc<CoreInner>,
}

impl NatPmpCore {
    pub fn new(
        store: ConfigStore,
        session: Arc<dyn TorrentSession>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                store,
                status: RwLock::new(NatPmpStatus::default()),
                session,
                runner,
                timer: Mutex::new(RefreshTimer::default()),
                config_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Spawn the refresh service and start the timer if the plugin is enabled
    pub async fn enable(&self, manager: &ServiceManager) -> Result<()> {
        let _guard = self.inner.config_lock.lock().await;

        let handle = manager.spawn(RefreshService::new(self.clone())).await?;
        *self.inner.timer.lock() = RefreshTimer {
            handle: Some(handle),
            interval: None,
        };
        info!("NAT-PMP core enabled");
        self.update().await
    }

    /// Stop the timer and the refresh service, and clear the status
    pub async fn disable(&self, manager: &ServiceManager) -> Result<()> {
        let _guard = self.inner.config_lock.lock().await;

        self.stop_refresh_timer().await?;

        let handle = std::mem::take(&mut *self.inner.timer.lock()).handle;
        if handle.is_some() {
            manager.stop(REFRESH_SERVICE_ID).await?;
        }

        *self.inner.status.write() = NatPmpStatus::default();
        info!("NAT-PMP core disabled");
        Ok(())
    }

    /// Start or stop the timer to match the `enabled` flag
    async fn update(&self) -> Result<()> {
        if self.inner.store.get().enabled {
            self.start_refresh_timer().await
        } else {
            self.stop_refresh_timer().await
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh Timer
    // ─────────────────────────────────────────────────────────────────────

    /// Period of the running refresh timer
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.inner.timer.lock().interval
    }

    /// Start the timer when enabled with a usable executable and a non-zero period
    async fn start_refresh_timer(&self) -> Result<()> {
        let config = self.inner.store.get();

        if self.refresh_interval().is_some() || !config.enabled {
            return Ok(());
        }
        if !command::is_command_valid(&config.exec_path) {
            warn!(exec_path = %config.exec_path, "natpmpc executable not found, refresh timer not started");
            return Ok(());
        }
        if config.refresh_interval == 0 {
            warn!("Refresh interval is 0, refresh timer not started");
            return Ok(());
        }

        debug!("Starting refresh timer with interval {}s", config.refresh_interval);
        self.set_timer(Some(Duration::from_secs(config.refresh_interval as u64)))
            .await
    }

    async fn stop_refresh_timer(&self) -> Result<()> {
        if self.refresh_interval().is_none() {
            return Ok(());
        }

        debug!("Stopping refresh timer");
        self.set_timer(None).await
    }

    async fn set_timer(&self, interval: Option<Duration>) -> Result<()> {
        let handle = self.inner.timer.lock().handle.clone();
        let Some(handle) = handle else {
            debug!("No refresh service, timer change deferred until enable");
            return Ok(());
        };

        handle.set_tick_interval(interval).await?;
        self.inner.timer.lock().interval = interval;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Exported Operations
    // ─────────────────────────────────────────────────────────────────────

    pub fn get_config(&self) -> NatPmpConfig {
        self.inner.store.get()
    }

    /// Store the submitted keys; the timer restarts if any value changed
    pub async fn set_config(&self, patch: NatPmpConfigPatch) -> Result<()> {
        patch.validate()?;

        let _guard = self.inner.config_lock.lock().await;

        let changed = self.inner.store.would_change(&patch);
        if changed {
            self.stop_refresh_timer().await?;
        }

        if let Err(e) = self.inner.store.update(&patch).await {
            // The stored config is untouched; resume the timer it implies
            if changed {
                self.start_refresh_timer().await?;
            }
            return Err(e);
        }

        if changed {
            info!("NAT-PMP configuration changed");
            self.start_refresh_timer().await?;
        }
        Ok(())
    }

    pub fn get_status(&self) -> NatPmpStatus {
        self.inner.status.read().clone()
    }

    pub fn is_command_valid(&self, command: &str) -> bool {
        command::is_command_valid(command)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh Internals
    // ─────────────────────────────────────────────────────────────────────

    pub(super) fn session(&self) -> &Arc<dyn TorrentSession> {
        &self.inner.session
    }

    pub(super) fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.inner.runner
    }

    pub(super) fn set_status(&self, status: NatPmpStatus) {
        *self.inner.status.write() = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::{CommandError, CommandOutput, MemorySession};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts natpmpc runs and answers with empty output
    #[derive(Default)]
    struct CountingRunner {
        runs: AtomicUsize,
    }

    impl CountingRunner {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandRunner for CountingRunner {
        async fn run(
            &self,
            _argv: &[String],
            _timeout: Option<Duration>,
        ) -> std::result::Result<CommandOutput, CommandError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput {
                success: true,
                output: String::new(),
            })
        }
    }

    async fn core_in(dir: &std::path::Path) -> (NatPmpCore, Arc<CountingRunner>) {
        let store = ConfigStore::open(dir).await.unwrap();
        let runner = Arc::new(CountingRunner::default());
        let core = NatPmpCore::new(store, Arc::new(MemorySession::new(6881)), runner.clone());
        (core, runner)
    }

    fn enabled_patch(refresh_interval: u32) -> NatPmpConfigPatch {
        NatPmpConfigPatch {
            enabled: Some(true),
            // Exists on every unix host
            exec_path: Some("/bin/sh".to_string()),
            refresh_interval: Some(refresh_interval),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_set_config_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _) = core_in(dir.path()).await;

        core.set_config(NatPmpConfigPatch {
            gateway_address: Some("192.168.1.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(core.get_config().gateway_address, "192.168.1.1");
        let reopened = ConfigStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get().gateway_address, "192.168.1.1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timer_follows_enabled_flag() {
        let dir = tempfile::tempdir().unwrap();
        let (core, runner) = core_in(dir.path()).await;
        let manager = ServiceManager::new();
        core.enable(&manager).await.unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.set_config(enabled_patch(30)).await.unwrap();
        assert_eq!(core.refresh_interval(), Some(Duration::from_secs(30)));
        settle().await;
        assert!(runner.runs.load(Ordering::SeqCst) >= 1);

        // A changed interval restarts the timer with the new period
        core.set_config(NatPmpConfigPatch {
            refresh_interval: Some(90),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(core.refresh_interval(), Some(Duration::from_secs(90)));

        core.set_config(NatPmpConfigPatch {
            enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.disable(&manager).await.unwrap();
    }

    #[tokio::test]
    async fn test_timer_needs_valid_executable() {
        let dir = tempfile::tempdir().unwrap();
        let (core, runner) = core_in(dir.path()).await;
        let manager = ServiceManager::new();
        core.enable(&manager).await.unwrap();

        core.set_config(NatPmpConfigPatch {
            enabled: Some(true),
            exec_path: Some("/nonexistent/natpmpc".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        settle().await;

        assert!(core.get_config().enabled);
        assert_eq!(core.refresh_interval(), None);
        assert_eq!(runner.runs(), 0);

        core.disable(&manager).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_interval_keeps_timer_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _) = core_in(dir.path()).await;
        let manager = ServiceManager::new();
        core.enable(&manager).await.unwrap();

        core.set_config(enabled_patch(0)).await.unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.disable(&manager).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_config_before_enable_starts_ticking() {
        let dir = tempfile::tempdir().unwrap();
        let (core, runner) = core_in(dir.path()).await;
        let manager = ServiceManager::new();

        core.set_config(enabled_patch(3600)).await.unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.enable(&manager).await.unwrap();
        assert!(manager.get(REFRESH_SERVICE_ID).is_some());
        assert_eq!(core.refresh_interval(), Some(Duration::from_secs(3600)));

        // First tick of a started timer is immediate: one run per protocol
        settle().await;
        assert_eq!(runner.runs(), 2);

        core.disable(&manager).await.unwrap();
        assert!(manager.get(REFRESH_SERVICE_ID).is_none());
        assert_eq!(core.refresh_interval(), None);
        assert!(core.get_status().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reenable_after_config_change_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let (core, runner) = core_in(dir.path()).await;
        let manager = ServiceManager::new();

        core.enable(&manager).await.unwrap();
        core.disable(&manager).await.unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.set_config(enabled_patch(3600)).await.unwrap();
        assert_eq!(core.refresh_interval(), None);

        core.enable(&manager).await.unwrap();
        settle().await;
        assert_eq!(core.refresh_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(runner.runs(), 2);

        core.disable(&manager).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_config_keeps_timer_in_sync() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _) = core_in(dir.path()).await;
        let manager = ServiceManager::new();
        core.enable(&manager).await.unwrap();
        core.set_config(enabled_patch(45)).await.unwrap();

        for round in 0..20u32 {
            let interval = core.clone();
            let gateway = core.clone();
            let (a, b) = tokio::join!(
                tokio::spawn(async move {
                    interval
                        .set_config(NatPmpConfigPatch {
                            refresh_interval: Some(60 + round),
                            ..Default::default()
                        })
                        .await
                }),
                tokio::spawn(async move {
                    gateway
                        .set_config(NatPmpConfigPatch {
                            gateway_address: Some(format!("10.0.0.{}", round)),
                            ..Default::default()
                        })
                        .await
                }),
            );
            a.unwrap().unwrap();
            b.unwrap().unwrap();

            let stored = core.get_config().refresh_interval;
            assert_eq!(
                core.refresh_interval(),
                Some(Duration::from_secs(stored as u64))
            );
        }

        core.disable(&manager).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_save_keeps_timer_running() {
        let base = tempfile::tempdir().unwrap();
        let config_dir = base.path().join("config");
        std::fs::create_dir(&config_dir).unwrap();

        let (core, _) = core_in(&config_dir).await;
        let manager = ServiceManager::new();
        core.enable(&manager).await.unwrap();
        core.set_config(enabled_patch(45)).await.unwrap();

        // A file where the config directory was makes every save fail
        std::fs::remove_dir_all(&config_dir).unwrap();
        std::fs::write(&config_dir, "").unwrap();

        let result = core
            .set_config(NatPmpConfigPatch {
                refresh_interval: Some(90),
                ..Default::default()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(core.get_config().refresh_interval, 45);
        assert_eq!(core.refresh_interval(), Some(Duration::from_secs(45)));

        core.disable(&manager).await.unwrap();
    }
}
