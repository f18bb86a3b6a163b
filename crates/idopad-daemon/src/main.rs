//! idopad-daemon: the launchpad backend daemon.
//!
//! Single OS process running a Tokio async runtime. Clients communicate
//! with the daemon via JSON-RPC over a Unix socket; price polling and
//! platform-wallet scanning run as owned background loops.

mod commands;
mod config;
mod events;
mod jobs;
mod mail;
mod rpc;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use idopad_oracle::fixed::{FixedChainReader, FixedOracle};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::jobs::Jobs;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Outbound notification channel.
    pub notifier: Arc<dyn mail::Notifier>,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("idopad=info".parse()?),
        )
        .init();

    info!("idopad daemon starting");

    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("idopad.db");
    let conn = idopad_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Create event bus and shutdown channel
    let event_bus = EventBus::new(1000);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 4. Build daemon state
    let state = Arc::new(DaemonState {
        db,
        config,
        event_bus,
        notifier: Arc::new(mail::LogNotifier),
        shutdown_tx: shutdown_tx.clone(),
    });

    // 5. Start background jobs with the fixed market clients; HTTP-backed
    //    clients substitute behind the same traits in production.
    let oracle = Arc::new(FixedOracle::new());
    let chain = Arc::new(FixedChainReader::new());
    let jobs = Jobs::start(state.clone(), oracle, chain);

    // 6. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    state.event_bus.emit(
        "DaemonStarted",
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    );

    // 7. Run the RPC server until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    jobs.join().await;

    let _ = std::fs::remove_file(&socket_path);
    info!("Daemon stopped");
    Ok(())
}
