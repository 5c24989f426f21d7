//! Netwatch Poller - fleet probe for master link status
//!
//! Each run:
//! - Fetches the host inventory (remote feed or inline list)
//! - Probes every host over SSH under a concurrency cap, with retries
//! - Classifies the `netstat` output into (peer address, connection state)
//! - Appends one observation per host to the history store
//!
//! Runs once by default, or periodically when `polling.interval_secs` is set.

mod classifier;
mod config;
mod engine;
mod probe;
mod recorder;
mod retry;
mod transport;

use anyhow::{Context, Result};
use config::PollerConfig;
use engine::PollingEngine;
use netwatch_common::{HistoryStore, SqliteHistoryStore};
use probe::Probe;
use recorder::Recorder;
use std::sync::Arc;
use tracing::{error, info, warn};
use transport::SshShell;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas
    netwatch_common::logging::init_tracing("info");

    info!("Netwatch Poller v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = PollerConfig::load().await.context("Failed to load poller config")?;
    let inventory = config.inventory_source().context("No inventory configured")?;
    if config.ssh.password.is_none() {
        warn!("{} not set, authenticating with an empty password", config::PASSWORD_ENV);
    }

    let store: Arc<dyn HistoryStore> = Arc::new(
        SqliteHistoryStore::open(&config.store.database_path)
            .with_context(|| format!("Failed to open history store {}", config.store.database_path.display()))?,
    );

    let probe = Probe::new(SshShell::new(), config.credentials())
        .with_command(config.ssh.command.clone())
        .with_port(config.ssh.port);
    info!(command = probe.command(), user = %config.ssh.username, port = config.ssh.port, "probe configured");
    let engine = PollingEngine::new(probe, Recorder::new(store), config.engine_settings());

    match config.interval() {
        None => {
            engine.poll_fleet(&inventory).await.context("Poll run aborted")?;
        }
        Some(period) => {
            info!(period_secs = period.as_secs(), "periodic mode");
            engine.run_periodic(&inventory, period, shutdown_signal()).await;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
