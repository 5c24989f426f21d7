/*!
 * NETWATCH KERNEL - Point d'entrée du serveur de lecture
 *
 * RÔLE : Sert le statut courant de chaque hôte, calculé depuis l'historique écrit
 * par le poller et mémorisé dans un cache à durée de vie fixe.
 *
 * ARCHITECTURE : config YAML → store SQLite → agrégateur + cache → API REST Axum.
 */

mod aggregator;
mod cache;
mod config;
mod health;
mod http;
mod query;

use crate::aggregator::StatusAggregator;
use crate::cache::{MemoryCache, StatusCache};
use crate::config::load_config;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::query::StatusService;

use anyhow::{Context, Result};
use netwatch_common::{HistoryStore, InventorySource, SqliteHistoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    netwatch_common::logging::init_tracing("info");

    let cfg = load_config().await;
    info!(strategy = %cfg.strategy, ttl_secs = cfg.cache_ttl_secs, "kernel config loaded");

    // store inaccessible = erreur de configuration, on s'arrête
    let store: Arc<dyn HistoryStore> = Arc::new(
        SqliteHistoryStore::open(&cfg.database_path)
            .with_context(|| format!("Failed to open history store {}", cfg.database_path.display()))?,
    );

    let health_tracker = HealthTracker::new(cfg.strategy);
    let cache: Arc<dyn StatusCache> = Arc::new(MemoryCache::new());
    let mut service = StatusService::new(store, cache, StatusAggregator::new(cfg.strategy), health_tracker.clone())
        .with_ttl(cfg.cache_ttl());
    if let Some(url) = &cfg.inventory_url {
        info!(%url, "filtering status by inventory");
        service = service.with_inventory(InventorySource::http(url.clone()));
    }
    if cfg.api_key.is_none() {
        info!("no api key configured, read API is open");
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        service: Arc::new(service),
        health_tracker,
        api_key: cfg.api_key.clone(),
    };
    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.listen.parse().with_context(|| format!("Invalid listen address {}", cfg.listen))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested, stopping kernel");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
