mod api;
mod config;
mod db;
mod error;
mod fetcher;
mod mapper;
mod payload;
mod scheduler;
mod sync;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::OddsStore;
use crate::error::Result;
use crate::fetcher::ProviderClient;
use crate::scheduler::SyncScheduler;
use crate::sync::SyncService;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::open(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Sync pipeline ---
    let store = OddsStore::new(pool);
    let fetcher = Arc::new(ProviderClient::new(&cfg)?);
    let service = SyncService::new(fetcher, store.clone());
    let scheduler = SyncScheduler::new(service, Duration::from_secs(cfg.sync_interval_secs));
    scheduler.start();

    // --- HTTP API server ---
    let app = router(ApiState {
        scheduler: Arc::clone(&scheduler),
        store,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    // Stop the timer as soon as the signal arrives so no new cycle starts
    // while axum drains connections.
    let timer = Arc::clone(&scheduler);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            timer.cancel();
        })
        .await;

    info!("Shutting down, waiting for any running sync cycle");
    scheduler.stop().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
