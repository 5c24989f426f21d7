//! History store - append-only log of poll observations
//!
//! - `HistoryStore` = common interface used by the poller (append) and the kernel (read)
//! - `SqliteHistoryStore` = production implementation on a local SQLite file
//!
//! Rows are never updated or deleted. The store assigns `id` and `recorded_at`
//! at insertion; `recorded_at` never goes backwards for a given store instance.

mod sqlite;

pub use sqlite::SqliteHistoryStore;

use crate::models::{NewObservation, Observation};

/// Errors raised by history store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history store unreachable: {0}")]
    Unreachable(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Interface every history backend implements
pub trait HistoryStore: Send + Sync {
    /// Appends exactly one row and returns it with its assigned id and timestamp
    fn append(&self, observation: &NewObservation) -> Result<Observation, StoreError>;

    /// Every row, ordered by `(recorded_at, id)` ascending
    fn history(&self) -> Result<Vec<Observation>, StoreError>;

    /// Rows of one host, same ordering as `history`
    fn history_for(&self, alias: &str) -> Result<Vec<Observation>, StoreError>;

    /// Cheap reachability check, used before a poll run starts
    fn ping(&self) -> Result<(), StoreError>;
}
