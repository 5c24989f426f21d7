//! Netwatch common - shared pieces of the master-link monitoring system
//!
//! Used by both binaries:
//! - `netwatch-poller` appends observations after probing each host
//! - `netwatch-kernel` reads the history and serves the current status per host

pub mod inventory;
pub mod logging;
pub mod models;
pub mod store;

pub use inventory::{InventoryError, InventorySource};
pub use models::{AddressField, ConnectionState, HostTarget, NewObservation, Observation, StatusRow};
pub use store::{HistoryStore, SqliteHistoryStore, StoreError};
