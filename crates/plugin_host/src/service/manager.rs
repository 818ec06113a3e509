//! Service Manager
//!
//! Each service gets its own tokio task; the manager keeps the handles by id so
//! services can be looked up, retimed and stopped later.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::{
    Service, ServiceCommand, ServiceContext, ServiceError, ServiceHandle, ServiceResult,
    ServiceSpec, ServiceState,
};

/// Pending commands per service before `ServiceHandle` sends wait
const COMMAND_BUFFER: usize = 64;

/// Poll period while `shutdown_all` waits for tasks to drain
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Table entry for a spawned service
struct Entry {
    handle: ServiceHandle,
    task: JoinHandle<ServiceResult<()>>,
    stop_timeout: Duration,
}

pub struct ServiceManager {
    services: DashMap<String, Entry>,
    stop_all_tx: broadcast::Sender<()>,
    drain_timeout: Duration,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (stop_all_tx, _) = broadcast::channel(1);

        Self {
            services: DashMap::new(),
            stop_all_tx,
            drain_timeout: Duration::from_secs(30),
        }
    }

    /// Spawn `service`; fails if its id is already in the table
    pub async fn spawn<S: Service>(&self, service: S) -> ServiceResult<ServiceHandle> {
        let spec = service.spec();
        if self.services.contains_key(&spec.id) {
            return Err(ServiceError::AlreadyRunning(spec.id));
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let state = Arc::new(AtomicU8::new(ServiceState::Starting as u8));
        let handle = ServiceHandle::new(spec.id.clone(), command_tx, Arc::clone(&state));

        let stop_all_rx = self.stop_all_tx.subscribe();
        let stop_timeout = spec.shutdown_timeout;
        let id = spec.id.clone();
        let task = tokio::spawn(run_service_loop(service, spec, command_rx, stop_all_rx, state));

        self.services.insert(
            id,
            Entry {
                handle: handle.clone(),
                task,
                stop_timeout,
            },
        );

        Ok(handle)
    }

    pub fn get(&self, service_id: &str) -> Option<ServiceHandle> {
        self.services.get(service_id).map(|e| e.handle.clone())
    }

    pub fn is_running(&self, service_id: &str) -> bool {
        self.services
            .get(service_id)
            .is_some_and(|e| e.handle.is_running())
    }

    /// Take `service_id` out of the table and wait for its task.
    ///
    /// The result is whatever `on_stop` returned, a timeout if the task outlived the
    /// service's `shutdown_timeout`, or `Internal` if it panicked.
    pub async fn stop(&self, service_id: &str) -> ServiceResult<()> {
        let (_, entry) = self
            .services
            .remove(service_id)
            .ok_or_else(|| ServiceError::NotRunning(service_id.to_string()))?;

        // The task may already be gone, the join below reports how it ended
        let _ = entry.handle.shutdown().await;

        let Ok(joined) = tokio::time::timeout(entry.stop_timeout, entry.task).await else {
            tracing::warn!(service_id, "Timed out waiting for service to stop");
            return Err(ServiceError::ShutdownTimeout);
        };
        joined.unwrap_or_else(|e| {
            tracing::error!(service_id, error = ?e, "Service task panicked");
            Err(ServiceError::Internal(format!("service task panicked: {e}")))
        })
    }

    /// Broadcast a stop to every task, then drop entries as they reach a terminal state
    pub async fn shutdown_all(&self) -> ServiceResult<()> {
        tracing::info!(count = self.services.len(), "Stopping all services");
        let _ = self.stop_all_tx.send(());

        let drained = tokio::time::timeout(self.drain_timeout, async {
            loop {
                self.services.retain(|_, e| !e.handle.is_terminal());
                if self.services.is_empty() {
                    break;
                }
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;

        drained.map_err(|_| {
            tracing::warn!(left = self.services.len(), "Services still running after shutdown");
            ServiceError::ShutdownTimeout
        })
    }

    /// `(id, state)` for each entry
    pub fn list(&self) -> Vec<(String, ServiceState)> {
        self.services
            .iter()
            .map(|e| (e.key().clone(), e.handle.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// A zero period would panic inside tokio, so it is treated as no timer
fn make_timer(service_id: &str, interval: Option<Duration>) -> Option<Interval> {
    let period = interval?;
    if period.is_zero() {
        tracing::warn!(service_id, "Ignoring zero tick interval");
        return None;
    }
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

/// Resolves on the next tick, or never when there is no timer
async fn next_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

fn set_state(state: &AtomicU8, value: ServiceState) {
    state.store(value as u8, Ordering::SeqCst);
}

async fn run_service_loop<S: Service>(
    mut service: S,
    spec: ServiceSpec,
    mut command_rx: mpsc::Receiver<ServiceCommand>,
    mut stop_all_rx: broadcast::Receiver<()>,
    state: Arc<AtomicU8>,
) -> ServiceResult<()> {
    let ctx = ServiceContext {
        service_id: spec.id.clone(),
    };
    let id = ctx.service_id.as_str();

    if let Err(e) = service.on_start(&ctx).await {
        tracing::error!(service_id = id, error = %e, "Service failed to start");
        set_state(&state, ServiceState::Failed);
        return Err(e);
    }
    set_state(&state, ServiceState::Running);
    tracing::info!(service_id = id, "Service started");

    let mut timer = make_timer(id, spec.tick_interval);

    loop {
        tokio::select! {
            _ = stop_all_rx.recv() => break,

            cmd = command_rx.recv() => match cmd {
                // Every handle was dropped
                None | Some(ServiceCommand::Shutdown) => break,
                Some(ServiceCommand::GetState(reply)) => {
                    let _ = reply.send(ServiceState::from_u8(state.load(Ordering::SeqCst)));
                }
                Some(ServiceCommand::SetTickInterval(interval)) => {
                    tracing::debug!(service_id = id, ?interval, "Retiming service");
                    timer = make_timer(id, interval);
                }
                Some(ServiceCommand::ForceTick) => {
                    if let Err(e) = service.on_tick(&ctx).await {
                        tracing::warn!(service_id = id, error = %e, "Forced tick failed");
                    }
                }
            },

            _ = next_tick(&mut timer) => {
                if let Err(e) = service.on_tick(&ctx).await {
                    tracing::warn!(service_id = id, error = %e, "Tick failed");
                }
            }
        }
    }

    set_state(&state, ServiceState::Stopping);
    let stopped = match tokio::time::timeout(spec.shutdown_timeout, service.on_stop(&ctx)).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::ShutdownTimeout),
    };

    match &stopped {
        Ok(()) => {
            set_state(&state, ServiceState::Stopped);
            tracing::info!(service_id = id, "Service stopped");
        }
        Err(e) => {
            set_state(&state, ServiceState::Failed);
            tracing::error!(service_id = id, error = %e, "Service did not stop cleanly");
        }
    }
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Calls {
        start: AtomicUsize,
        tick: AtomicUsize,
        stop: AtomicUsize,
    }

    impl Calls {
        fn ticks(&self) -> usize {
            self.tick.load(Ordering::SeqCst)
        }
    }

    /// Counts lifecycle calls; `stop_fails` makes `on_stop` return an error
    struct Recorder {
        spec: ServiceSpec,
        calls: Arc<Calls>,
        stop_fails: bool,
    }

    fn recorder(id: &str, interval: Option<Duration>) -> (Recorder, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let service = Recorder {
            spec: ServiceSpec::new(id, "Recorder").with_tick_interval(interval),
            calls: calls.clone(),
            stop_fails: false,
        };
        (service, calls)
    }

    #[async_trait::async_trait]
    impl Service for Recorder {
        fn spec(&self) -> ServiceSpec {
            self.spec.clone()
        }

        async fn on_start(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
            self.calls.start.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_stop(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
            self.calls.stop.fetch_add(1, Ordering::SeqCst);
            if self.stop_fails {
                return Err(ServiceError::Internal("stop failed".to_string()));
            }
            Ok(())
        }

        async fn on_tick(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
            self.calls.tick.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_spawn_then_stop() {
        let manager = ServiceManager::new();
        let (service, calls) = recorder("natpmp.refresh", None);

        let handle = manager.spawn(service).await.unwrap();
        assert_eq!(handle.request_state().await.unwrap(), ServiceState::Running);
        assert_eq!(calls.start.load(Ordering::SeqCst), 1);
        assert!(manager.is_running("natpmp.refresh"));

        manager.stop("natpmp.refresh").await.unwrap();
        assert_eq!(calls.stop.load(Ordering::SeqCst), 1);
        assert!(manager.get("natpmp.refresh").is_none());
        assert!(matches!(
            manager.stop("natpmp.refresh").await,
            Err(ServiceError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_reports_on_stop_error() {
        let manager = ServiceManager::new();
        let (mut service, _) = recorder("failing", None);
        service.stop_fails = true;

        let handle = manager.spawn(service).await.unwrap();
        assert!(matches!(
            manager.stop("failing").await,
            Err(ServiceError::Internal(_))
        ));
        assert_eq!(handle.state(), ServiceState::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let manager = ServiceManager::new();
        let (first, _) = recorder("natpmp", None);
        let (second, _) = recorder("natpmp", None);

        manager.spawn(first).await.unwrap();
        let result = manager.spawn(second).await;
        assert!(matches!(result, Err(ServiceError::AlreadyRunning(_))));
        assert_eq!(manager.len(), 1);

        manager.shutdown_all().await.unwrap();
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_idle_service_only_ticks_when_forced() {
        let manager = ServiceManager::new();
        let (service, calls) = recorder("idle", None);

        let handle = manager.spawn(service).await.unwrap();
        handle.request_state().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.ticks(), 0);

        handle.force_tick().await.unwrap();
        handle.request_state().await.unwrap();
        assert_eq!(calls.ticks(), 1);

        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_means_idle() {
        let manager = ServiceManager::new();
        let (service, calls) = recorder("zero", Some(Duration::ZERO));

        let handle = manager.spawn(service).await.unwrap();
        handle.request_state().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.ticks(), 0);
        assert!(handle.is_running());

        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_tick_interval_starts_and_stops_ticking() {
        let manager = ServiceManager::new();
        let (service, calls) = recorder("ticker", None);

        let handle = manager.spawn(service).await.unwrap();

        // First tick of a new interval fires immediately
        handle
            .set_tick_interval(Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.ticks(), 1);

        handle.set_tick_interval(None).await.unwrap();
        handle.request_state().await.unwrap();
        let ticks = calls.ticks();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.ticks(), ticks);

        manager.shutdown_all().await.unwrap();
        assert_eq!(calls.stop.load(Ordering::SeqCst), 1);
        assert_eq!(manager.list(), Vec::new());
    }
}
