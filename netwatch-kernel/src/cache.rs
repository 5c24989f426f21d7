/*!
 * CACHE DE STATUT - Stockage clé/valeur avec expiration
 *
 * RÔLE :
 * Collaborateur clé/valeur devant la requête d'agrégation. Le service ne stocke
 * qu'une entrée (le résultat complet sérialisé), jamais de mise à jour partielle.
 *
 * FONCTIONNEMENT :
 * - `get` : `Ok(None)` si absente ou expirée, `Err` pour une vraie panne
 * - `set` : remplace l'entrée (dernier écrivain gagne)
 * - `MemoryCache` : HashMap protégée, horloge tokio (testable avec le temps en pause)
 */

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

pub trait StatusCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry { value, expires_at: Instant::now() + ttl };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }
}
