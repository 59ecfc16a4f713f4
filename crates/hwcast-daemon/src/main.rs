//! hwcast daemon
//!
//! Samples hardware sensors on a fixed interval and serves the latest readings
//! over a REST API and a WebSocket push feed.

mod broadcast;
mod config;
mod poller;
mod snapshot;
mod state;
mod web;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use hwcast_hw::SysfsBackend;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use poller::Poller;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load_or_default(&config_path).context("Failed to load configuration")?;
    info!("Configuration: {:?}", config);

    let addr: SocketAddr = config.listen.parse().context("Invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Initialize application state
    let state = Arc::new(AppState::new(&config));

    // Start poll loop
    let backend = SysfsBackend::with_root(&config.sysfs_root);
    let poller = Poller::new(backend, state.clone(), config.poll_interval())
        .log_snapshots(config.log_snapshots)
        .spawn();

    // Setup Unix signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let app = web::create_router(state.clone());
    info!("Web server listening on http://{}", addr);

    // Run server with shutdown handling. If the poll loop dies the server keeps
    // serving the last snapshot.
    let served = tokio::select! {
        result = axum::serve(listener, app) => result.context("Web server failed"),
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
    };

    poller.shutdown().await;
    served
}
