//! SQLite-backed history store
//!
//! Schema (created on open):
//! - display_status: id, recorded_at_us, id_unit, ip_unit, foreign_address, status
//!
//! Timestamps are stored as microseconds since the Unix epoch so that the
//! `(recorded_at, id)` ordering is exact.

use super::{HistoryStore, StoreError};
use crate::models::{ConnectionState, NewObservation, Observation};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS display_status (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at_us INTEGER NOT NULL,
        id_unit TEXT NOT NULL,
        ip_unit TEXT NOT NULL DEFAULT '',
        foreign_address TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX IF NOT EXISTS idx_display_status_unit_time
        ON display_status (id_unit, recorded_at_us);
";

const SELECT_COLUMNS: &str =
    "SELECT id, recorded_at_us, id_unit, ip_unit, foreign_address, status FROM display_status";

struct Inner {
    conn: Connection,
    /// Last timestamp handed out, used to keep insert order monotonic
    last_us: i64,
}

/// SQLite history store
pub struct SqliteHistoryStore {
    inner: Mutex<Inner>,
}

impl SqliteHistoryStore {
    /// Open or create the database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unreachable(format!("{}: {e}", parent.display())))?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL lets the kernel read while the poller appends
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "history store opened");
        Ok(store)
    }

    /// Private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let last_us: i64 = conn.query_row(
            "SELECT COALESCE(MAX(recorded_at_us), 0) FROM display_status",
            [],
            |row| row.get(0),
        )?;
        Ok(Self { inner: Mutex::new(Inner { conn, last_us }) })
    }

    fn query(&self, sql: &str, alias: Option<&str>) -> Result<Vec<Observation>, StoreError> {
        let inner = self.inner.lock();
        let mut stmt = inner.conn.prepare(sql)?;
        let rows = match alias {
            Some(alias) => stmt.query_map(params![alias], read_row)?,
            None => stmt.query_map([], read_row)?,
        };

        let mut out = Vec::new();
        for row in rows {
            let (id, us, host_alias, host_address, peer_address, state) = row?;
            let recorded_at = DateTime::<Utc>::from_timestamp_micros(us).ok_or_else(|| {
                StoreError::Corrupt { id, reason: format!("timestamp out of range: {us}") }
            })?;
            out.push(Observation {
                id,
                recorded_at,
                host_alias,
                host_address,
                peer_address,
                state: ConnectionState::from_stored(&state),
            });
        }
        Ok(out)
    }
}

type RawRow = (i64, i64, String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, observation: &NewObservation) -> Result<Observation, StoreError> {
        let mut inner = self.inner.lock();
        let now_us = Utc::now().timestamp_micros().max(inner.last_us);

        inner.conn.execute(
            "INSERT INTO display_status (recorded_at_us, id_unit, ip_unit, foreign_address, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now_us,
                observation.host_alias,
                observation.host_address,
                observation.peer_address,
                observation.state.as_str(),
            ],
        )?;
        let id = inner.conn.last_insert_rowid();
        inner.last_us = now_us;

        let recorded_at = DateTime::<Utc>::from_timestamp_micros(now_us)
            .ok_or_else(|| StoreError::Corrupt { id, reason: "timestamp out of range".into() })?;
        debug!(id, host = %observation.host_alias, state = observation.state.as_str(), "row appended");

        Ok(Observation {
            id,
            recorded_at,
            host_alias: observation.host_alias.clone(),
            host_address: observation.host_address.clone(),
            peer_address: observation.peer_address.clone(),
            state: observation.state.clone(),
        })
    }

    fn history(&self) -> Result<Vec<Observation>, StoreError> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY recorded_at_us, id"), None)
    }

    fn history_for(&self, alias: &str) -> Result<Vec<Observation>, StoreError> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE id_unit = ?1 ORDER BY recorded_at_us, id"),
            Some(alias),
        )
    }

    fn ping(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        inner
            .conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| StoreError::Unreachable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_obs(alias: &str, state: ConnectionState) -> NewObservation {
        NewObservation {
            host_alias: alias.to_string(),
            host_address: "10.0.0.5".to_string(),
            peer_address: "10.0.0.9:7000-master".to_string(),
            state,
        }
    }

    #[test]
    fn test_append_assigns_increasing_ids_and_monotonic_time() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        let a = store.append(&new_obs("A", ConnectionState::Established)).unwrap();
        let b = store.append(&new_obs("A", ConnectionState::SynSent)).unwrap();
        let c = store.append(&new_obs("B", ConnectionState::NoMaster)).unwrap();

        assert!(a.id < b.id && b.id < c.id);
        assert!(a.recorded_at <= b.recorded_at && b.recorded_at <= c.recorded_at);
    }

    #[test]
    fn test_history_roundtrips_all_states() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        store.append(&new_obs("A", ConnectionState::NoMaster)).unwrap();
        store.append(&new_obs("A", ConnectionState::ConnectFailed)).unwrap();
        store.append(&new_obs("B", ConnectionState::Other("Failed to Connect".into()))).unwrap();

        let all = store.history().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].state, ConnectionState::NoMaster);
        assert_eq!(all[1].state, ConnectionState::ConnectFailed);
        assert_eq!(all[2].state, ConnectionState::Other("Failed to Connect".into()));

        let only_a = store.history_for("A").unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|o| o.host_alias == "A"));
        assert!(store.history_for("missing").unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_rows_and_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("history.db");

        let first_ts = {
            let store = SqliteHistoryStore::open(&path).unwrap();
            store.append(&new_obs("A", ConnectionState::Established)).unwrap().recorded_at
        };

        let store = SqliteHistoryStore::open(&path).unwrap();
        store.ping().unwrap();
        let next = store.append(&new_obs("A", ConnectionState::SynSent)).unwrap();
        assert!(next.recorded_at >= first_ts);

        let rows = store.history().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].state, ConnectionState::SynSent);
    }
}
