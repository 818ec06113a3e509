//! NAT-PMP Daemon
//!
//! Runs the core plugin standalone: config store, refresh service and the
//! JSON-RPC endpoint, with the web plugin registered against it in-process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use plugin_host::service::ServiceManager;
use plugin_host::{HostContext, PluginRegistry, Preferences};

use natpmp::daemon::{ConfigStore, CoreExports, MemorySession, NatPmpCore, ProcessRunner};
use natpmp::server::{AppState, create_router};
use natpmp::settings::Settings;
use natpmp::web::{self, PLUGIN_NAME};

/// NAT-PMP port mapping daemon
#[derive(Parser, Debug)]
#[command(name = "natpmp")]
#[command(about = "NAT-PMP port mapping daemon", long_about = None)]
struct Args {
    /// Directory holding natpmp.conf
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Server host address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("natpmp=info,plugin_host=info,tower_http=info")
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.settings.as_deref())?;
    if let Some(dir) = args.config_dir {
        settings.config_dir = dir;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    info!("Starting NAT-PMP daemon v{}", env!("CARGO_PKG_VERSION"));

    // Core plugin
    let store = ConfigStore::open(&settings.config_dir).await?;
    info!("Config file: {}", store.path().display());

    let service_manager = Arc::new(ServiceManager::new());
    let session = Arc::new(MemorySession::new(settings.listen_port));
    let core = NatPmpCore::new(store, session, Arc::new(ProcessRunner));
    core.enable(&service_manager).await?;

    let exports = CoreExports::new(core.clone());

    // Web plugin, talking to the core in-process
    let preferences = Arc::new(Preferences::new());
    let registry = Arc::new(PluginRegistry::new(HostContext::new(
        preferences.clone(),
        Arc::new(exports.clone()),
    )));
    web::register(&registry)?;
    registry.enable(PLUGIN_NAME)?;
    info!("Preferences pages: {:?}", preferences.titles());

    // Log service status
    for (id, state) in service_manager.list() {
        info!("  - {} ({})", id, state);
    }

    let app = create_router(AppState::new(exports, service_manager.clone()));

    let addr = settings.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    info!("JSON-RPC endpoint: http://{}/json", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.disable_all();
    if let Err(e) = core.disable(&service_manager).await {
        warn!("Failed to disable core plugin: {}", e);
    }

    info!("Shutting down services...");
    if let Err(e) = service_manager.shutdown_all().await {
        warn!("Some services did not shut down cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
