//! Fleet and history data model shared by the poller and the kernel
//!
//! - `HostTarget`: one monitored host as delivered by the inventory feed
//! - `ConnectionState`: the single status fact extracted per poll attempt
//! - `Observation` / `NewObservation`: rows of the append-only history
//! - `StatusRow`: the JSON shape served by the read API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Label shown instead of the empty state at the presentation boundary
pub const NO_MASTER_LABEL: &str = "no master peer detected";

/// Address field as delivered by the inventory (`{"String": "...", "Valid": true}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressField {
    #[serde(rename = "String", default)]
    pub value: String,
    #[serde(rename = "Valid", default)]
    pub present: bool,
}

/// One monitored host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTarget {
    #[serde(rename = "id")]
    pub alias: String,
    #[serde(rename = "ip")]
    pub address: AddressField,
}

impl HostTarget {
    pub fn new(alias: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            address: AddressField { value: address.into(), present: true },
        }
    }

    /// Host whose inventory record marks the address as absent
    pub fn without_address(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            address: AddressField { value: String::new(), present: false },
        }
    }

    /// Returns the address to dial, or `None` when the host must not be probed
    pub fn probe_address(&self) -> Option<&str> {
        if !self.address.present {
            return None;
        }
        let addr = self.address.value.trim();
        if addr.is_empty() || !addr.chars().all(is_host_char) {
            return None;
        }
        Some(addr)
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_' | '[' | ']')
}

/// Outcome of one poll attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Established,
    SynSent,
    InvalidAddress,
    ConnectFailed,
    CommandFailed,
    /// Probe succeeded but no master line matched (stored as "")
    NoMaster,
    /// Anything else found in storage, e.g. rows written by older pollers
    Other(String),
}

impl ConnectionState {
    /// Storage form
    pub fn as_str(&self) -> &str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::ConnectFailed => "CONNECT_FAILED",
            Self::CommandFailed => "COMMAND_FAILED",
            Self::NoMaster => "",
            Self::Other(s) => s,
        }
    }

    /// Parses the storage form; never fails
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "ESTABLISHED" => Self::Established,
            "SYN_SENT" => Self::SynSent,
            "INVALID_ADDRESS" => Self::InvalidAddress,
            "CONNECT_FAILED" => Self::ConnectFailed,
            "COMMAND_FAILED" => Self::CommandFailed,
            "" => Self::NoMaster,
            other => Self::Other(other.to_string()),
        }
    }

    /// Human-readable form used by the read API only
    pub fn display_label(&self) -> &str {
        match self {
            Self::NoMaster => NO_MASTER_LABEL,
            other => other.as_str(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::InvalidAddress | Self::ConnectFailed | Self::CommandFailed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl Serialize for ConnectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConnectionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_stored(&raw))
    }
}

/// Row to append; timestamp and id are assigned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObservation {
    pub host_alias: String,
    pub host_address: String,
    pub peer_address: String,
    pub state: ConnectionState,
}

/// Immutable history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub host_alias: String,
    pub host_address: String,
    pub peer_address: String,
    pub state: ConnectionState,
}

impl Observation {
    /// Total order used by every aggregation: timestamp first, then insertion id
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.recorded_at, self.id)
    }
}

/// JSON row served by `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub id: i64,
    pub date_time: String,
    pub id_unit: String,
    pub ip_unit: String,
    pub foreign_address: String,
    pub status: String,
}

impl From<&Observation> for StatusRow {
    fn from(obs: &Observation) -> Self {
        StatusRow {
            id: obs.id,
            date_time: obs.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            id_unit: obs.host_alias.clone(),
            ip_unit: obs.host_address.clone(),
            foreign_address: obs.peer_address.clone(),
            status: obs.state.display_label().to_string(),
        }
    }
}
