use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use ladder_core::logging::init_tracing_default;
use ladder_server::api::{self, ApiState};
use ladder_server::config::ServerConfig;
use ladder_server::scheduler::spawn_scheduler;
use ladder_server::storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_default();
    info!("Starting Ladder server v{}", env!("CARGO_PKG_VERSION"));

    // ========================================================================
    // 1. Configuration + storage
    // ========================================================================
    let config = ServerConfig::from_env()?;
    let storage = storage::init_storage(&config)?;
    match &config.lmdb_path {
        Some(path) => info!("LMDB store initialized at: {}", path),
        None => info!("Running with in-memory storage"),
    }
    let stats = storage.engine.stats();
    info!(
        leaderboards = stats.leaderboards,
        tournaments = stats.tournaments,
        "ranking engine ready"
    );

    // ========================================================================
    // 2. Reset scheduler
    // ========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = ApiState::new(storage.engine.clone());
    let scheduler = spawn_scheduler(
        storage.engine.clone(),
        Duration::from_secs(config.engine.scheduler_interval_secs),
        shutdown_rx,
    );

    // ========================================================================
    // 3. HTTP API (blocks until Ctrl+C)
    // ========================================================================
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };
    api::start_api_server(state, config.api_port, shutdown).await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        error!("Scheduler task failed: {}", e);
    }
    if let Some(lmdb) = &storage.lmdb {
        lmdb.sync()?;
    }
    info!("Ladder server stopped");
    Ok(())
}
