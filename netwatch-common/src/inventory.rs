//! Inventory sources - where the list of hosts to poll comes from
//!
//! - `Http`: remote feed returning `[{"id": ..., "ip": {"String": ..., "Valid": ...}}]`
//! - `Static`: hosts listed inline in configuration

use crate::models::HostTarget;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("inventory request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("inventory feed answered {0}")]
    Status(reqwest::StatusCode),
    #[error("inventory payload invalid: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum InventorySource {
    Http { url: String, timeout: Duration },
    Static(Vec<HostTarget>),
}

impl InventorySource {
    pub fn http(url: impl Into<String>) -> Self {
        Self::Http { url: url.into(), timeout: Duration::from_secs(10) }
    }

    /// Fetch the current ordered host list
    pub async fn fetch(&self) -> Result<Vec<HostTarget>, InventoryError> {
        match self {
            Self::Static(hosts) => {
                debug!(count = hosts.len(), "using static inventory");
                Ok(hosts.clone())
            }
            Self::Http { url, timeout } => {
                let client = reqwest::Client::builder().timeout(*timeout).build()?;
                let response = client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(InventoryError::Status(response.status()));
                }
                let body = response.bytes().await?;
                let hosts = parse_inventory(&body)?;
                info!(%url, count = hosts.len(), "inventory fetched");
                Ok(hosts)
            }
        }
    }
}

/// Decode an inventory payload; a JSON `null` is an empty fleet
pub fn parse_inventory(body: &[u8]) -> Result<Vec<HostTarget>, serde_json::Error> {
    let hosts: Option<Vec<HostTarget>> = serde_json::from_slice(body)?;
    Ok(hosts.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_inventory_keeps_order() {
        let source = InventorySource::Static(vec![
            HostTarget::new("b", "10.0.0.2"),
            HostTarget::new("a", "10.0.0.1"),
        ]);
        let hosts = source.fetch().await.unwrap();
        assert_eq!(hosts[0].alias, "b");
        assert_eq!(hosts[1].alias, "a");
    }

    #[test]
    fn test_parse_inventory_null_and_garbage() {
        assert!(parse_inventory(b"null").unwrap().is_empty());
        assert!(parse_inventory(b"{\"oops\": 1}").is_err());
    }

    #[test]
    fn test_parse_inventory_missing_ip_fields_default_to_absent() {
        let hosts = parse_inventory(br#"[{"id": "x", "ip": {}}]"#).unwrap();
        assert_eq!(hosts[0].probe_address(), None);
    }
}
