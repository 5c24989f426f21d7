/*!
History store en mémoire pour tests sans SQLite

Implémente `HistoryStore` avec:
- Compteurs d'appels (append / lectures) pour les assertions
- Interrupteurs de panne (append, lecture, ping, panne ciblée par hôte)
- Injection de lignes avec horodatage explicite pour les scénarios d'agrégation
*/

use chrono::{DateTime, Utc};
use netwatch_common::{HistoryStore, NewObservation, Observation, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: Mutex<Vec<Observation>>,
    appends: AtomicUsize,
    reads: AtomicUsize,
    fail_appends: AtomicBool,
    fail_reads: AtomicBool,
    unreachable: AtomicBool,
    failing_hosts: Mutex<HashSet<String>>,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pré-remplit le store avec des lignes déjà horodatées
    pub fn with_rows(rows: impl IntoIterator<Item = Observation>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert_raw(row);
        }
        store
    }

    /// Ajoute une ligne telle quelle (id et horodatage fournis par le test)
    pub fn insert_raw(&self, row: Observation) {
        self.rows.lock().push(row);
    }

    pub fn rows(&self) -> Vec<Observation> {
        self.rows.lock().clone()
    }

    pub fn rows_for(&self, alias: &str) -> Vec<Observation> {
        self.rows.lock().iter().filter(|r| r.host_alias == alias).cloned().collect()
    }

    /// Nombre d'appels à `append` (réussis ou non)
    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Nombre d'appels à `history` / `history_for`
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Panne d'écriture limitée à un seul hôte
    pub fn fail_appends_for(&self, alias: &str) {
        self.failing_hosts.lock().insert(alias.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Ralentit les lectures (pour provoquer des requêtes concurrentes)
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.unreachable.load(Ordering::SeqCst) || self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("memory store read failure".into()));
        }
        Ok(())
    }

    fn sorted(mut rows: Vec<Observation>) -> Vec<Observation> {
        rows.sort_by_key(Observation::order_key);
        rows
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, observation: &NewObservation) -> Result<Observation, StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst)
            || self.fail_appends.load(Ordering::SeqCst)
            || self.failing_hosts.lock().contains(&observation.host_alias)
        {
            return Err(StoreError::Unreachable(format!(
                "memory store refused row for {}",
                observation.host_alias
            )));
        }

        let mut rows = self.rows.lock();
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let last: Option<DateTime<Utc>> = rows.iter().map(|r| r.recorded_at).max();
        let now = Utc::now();
        let recorded_at = match last {
            Some(last) if last > now => last,
            _ => now,
        };

        let row = Observation {
            id,
            recorded_at,
            host_alias: observation.host_alias.clone(),
            host_address: observation.host_address.clone(),
            peer_address: observation.peer_address.clone(),
            state: observation.state.clone(),
        };
        rows.push(row.clone());
        tracing::debug!(id, host = %row.host_alias, "[stub] row appended");
        Ok(row)
    }

    fn history(&self) -> Result<Vec<Observation>, StoreError> {
        self.check_read()?;
        Ok(Self::sorted(self.rows()))
    }

    fn history_for(&self, alias: &str) -> Result<Vec<Observation>, StoreError> {
        self.check_read()?;
        Ok(Self::sorted(self.rows_for(alias)))
    }

    fn ping(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("memory store offline".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwatch_common::ConnectionState;

    fn new_obs(alias: &str) -> NewObservation {
        NewObservation {
            host_alias: alias.into(),
            host_address: "10.0.0.1".into(),
            peer_address: String::new(),
            state: ConnectionState::NoMaster,
        }
    }

    #[test]
    fn test_failures_are_scoped_to_one_host() {
        let store = MemoryHistoryStore::new();
        store.fail_appends_for("bad");
        assert!(store.append(&new_obs("bad")).is_err());
        assert!(store.append(&new_obs("good")).is_ok());
        assert_eq!(store.append_calls(), 2);
        assert_eq!(store.rows().len(), 1);
    }

    #[test]
    fn test_read_counter_and_switches() {
        let store = MemoryHistoryStore::new();
        store.history().unwrap();
        store.fail_reads(true);
        assert!(store.history().is_err());
        assert_eq!(store.read_calls(), 2);

        store.set_unreachable(true);
        assert!(store.ping().is_err());
    }
}
