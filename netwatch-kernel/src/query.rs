/*!
 * SERVICE DE REQUÊTE - Statut courant de la flotte derrière un cache
 *
 * FONCTIONNEMENT :
 * - Hit : le blob JSON en cache est renvoyé tel quel (aucune lecture du store)
 * - Miss : historique → agrégation → filtre inventaire (optionnel) → JSON → cache
 * - Un seul recalcul à la fois : les miss concurrents attendent puis relisent le cache
 *
 * ERREURS :
 * - Écriture cache en échec : warning, le résultat frais est quand même renvoyé
 * - Lecture cache en échec : erreur remontée à l'appelant (pas de repli sur le store)
 */

use crate::aggregator::StatusAggregator;
use crate::cache::{CacheError, StatusCache};
use crate::health::HealthTracker;
use netwatch_common::{HistoryStore, InventoryError, InventorySource, StatusRow, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CACHE_KEY: &str = "status_cache";
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("cache read failed: {0}")]
    CacheRead(#[from] CacheError),
    #[error("history query failed: {0}")]
    Store(#[from] StoreError),
    #[error("inventory unavailable: {0}")]
    Inventory(#[from] InventoryError),
    #[error("cannot encode status: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("history query aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct StatusService {
    store: Arc<dyn HistoryStore>,
    cache: Arc<dyn StatusCache>,
    aggregator: StatusAggregator,
    ttl: Duration,
    inventory: Option<InventorySource>,
    refresh: tokio::sync::Mutex<()>,
    health: HealthTracker,
}

impl StatusService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        cache: Arc<dyn StatusCache>,
        aggregator: StatusAggregator,
        health: HealthTracker,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            ttl: DEFAULT_TTL,
            inventory: None,
            refresh: tokio::sync::Mutex::new(()),
            health,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Ne garder que les alias encore présents dans l'inventaire
    pub fn with_inventory(mut self, inventory: InventorySource) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// JSON array of `StatusRow`, served from cache while fresh
    pub async fn get_status(&self) -> Result<Vec<u8>, QueryError> {
        if let Some(blob) = self.cached()? {
            return Ok(blob);
        }

        let _refresh = self.refresh.lock().await;
        // un autre appel a pu remplir le cache pendant l'attente
        if let Some(blob) = self.cached()? {
            return Ok(blob);
        }
        self.health.record_miss();

        let blob = match self.recompute().await {
            Ok(blob) => blob,
            Err(e) => {
                self.health.record_refresh_error(&e.to_string());
                return Err(e);
            }
        };
        self.health.record_recompute();

        if let Err(e) = self.cache.set(CACHE_KEY, blob.clone(), self.ttl) {
            warn!("failed to populate status cache: {e}");
        }
        Ok(blob)
    }

    fn cached(&self) -> Result<Option<Vec<u8>>, QueryError> {
        let hit = self.cache.get(CACHE_KEY)?;
        if hit.is_some() {
            debug!(key = CACHE_KEY, "status cache hit");
            self.health.record_hit();
        }
        Ok(hit)
    }

    async fn recompute(&self) -> Result<Vec<u8>, QueryError> {
        let store = self.store.clone();
        let history = tokio::task::spawn_blocking(move || store.history()).await??;
        let rows_read = history.len();

        let mut current = self.aggregator.aggregate(history);
        if let Some(source) = &self.inventory {
            let hosts = source.fetch().await?;
            let known: HashSet<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
            current.retain(|o| known.contains(o.host_alias.as_str()));
        }

        let rows: Vec<StatusRow> = current.iter().map(StatusRow::from).collect();
        info!(
            strategy = %self.aggregator.strategy(),
            rows_read,
            hosts = rows.len(),
            "status recomputed"
        );
        Ok(serde_json::to_vec(&rows)?)
    }
}
