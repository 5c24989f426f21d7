//! Poller configuration
//!
//! Handles:
//! - Inventory source (remote feed URL or inline host list)
//! - SSH login, port and diagnostic command
//! - Concurrency / retry / timeout policy
//! - History database location
//!
//! The SSH password is never read from or written to the file; it comes from
//! `NETWATCH_SSH_PASSWORD` (a `.env` file is honoured).

use crate::engine::EngineSettings;
use crate::retry::RetryPolicy;
use crate::transport::Credentials;
use netwatch_common::{HostTarget, InventorySource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "NETWATCH_POLLER_CONFIG";
pub const PASSWORD_ENV: &str = "NETWATCH_SSH_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("inventory needs either `url` or `hosts`")]
    NoInventory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub inventory: InventoryConfig,
    pub ssh: SshConfig,
    pub polling: PollingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub hosts: Vec<HostTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub username: String,
    pub port: u16,
    pub command: String,
    #[serde(skip)] // Never serialize passwords
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub concurrency_limit: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub backoff_factor: f64,
    pub max_retry_delay_secs: u64,
    pub probe_timeout_secs: u64,
    /// Repeat runs at this period; run once when absent
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { url: None, timeout_secs: 10, hosts: Vec::new() }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            port: 22,
            command: crate::probe::DEFAULT_COMMAND.to_string(),
            password: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 100,
            max_retries: 2,
            retry_delay_secs: 5,
            backoff_factor: 1.0,
            max_retry_delay_secs: 60,
            probe_timeout_secs: 10,
            interval_secs: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_path: PathBuf::from("./data/history.db") }
    }
}

impl PollerConfig {
    /// Load from `$NETWATCH_POLLER_CONFIG` (default `poller.toml`); defaults when absent
    pub async fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "poller.toml".into());
        let mut config = Self::load_from(Path::new(&path)).await?;
        config.ssh.password = std::env::var(PASSWORD_ENV).ok();
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no poller config, using defaults");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn inventory_source(&self) -> Result<InventorySource, ConfigError> {
        match &self.inventory.url {
            Some(url) => Ok(InventorySource::Http {
                url: url.clone(),
                timeout: Duration::from_secs(self.inventory.timeout_secs),
            }),
            None if !self.inventory.hosts.is_empty() => Ok(InventorySource::Static(self.inventory.hosts.clone())),
            None => Err(ConfigError::NoInventory),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.ssh.username.clone(),
            password: self.ssh.password.clone().unwrap_or_default(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let p = &self.polling;
        EngineSettings {
            concurrency_limit: p.concurrency_limit,
            retry: RetryPolicy {
                max_attempts: p.max_retries,
                delay: Duration::from_secs(p.retry_delay_secs),
                backoff_factor: p.backoff_factor,
                max_delay: Duration::from_secs(p.max_retry_delay_secs),
            }
            .normalized(),
            probe_timeout: Duration::from_secs(p.probe_timeout_secs),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.polling.interval_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.polling.concurrency_limit, 100);
        assert_eq!(config.polling.max_retries, 2);
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.command, "netstat");
        assert!(config.interval().is_none());
        assert!(matches!(config.inventory_source(), Err(ConfigError::NoInventory)));
    }

    #[test]
    fn test_parse_full_config() {
        let config = PollerConfig::parse(
            r#"
            [inventory]
            url = "http://inventory.lan:5010/ipunit"

            [ssh]
            username = "probe"
            command = "netstat -tn"

            [polling]
            concurrency_limit = 8
            max_retries = 3
            retry_delay_secs = 2
            interval_secs = 300

            [store]
            database_path = "/var/lib/netwatch/history.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.ssh.username, "probe");
        assert_eq!(config.ssh.port, 22);
        assert!(config.ssh.password.is_none());
        assert_eq!(config.interval(), Some(Duration::from_secs(300)));
        assert!(matches!(config.inventory_source().unwrap(), InventorySource::Http { .. }));

        let settings = config.engine_settings();
        assert_eq!(settings.concurrency_limit, 8);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_inline_hosts_inventory() {
        let config = PollerConfig::parse(
            r#"
            [[inventory.hosts]]
            id = "unit-01"
            ip = { String = "10.0.0.5", Valid = true }

            [[inventory.hosts]]
            id = "unit-02"
            ip = { String = "", Valid = false }
            "#,
        )
        .unwrap();

        match config.inventory_source().unwrap() {
            InventorySource::Static(hosts) => {
                assert_eq!(hosts.len(), 2);
                assert_eq!(hosts[1].probe_address(), None);
            }
            other => panic!("unexpected inventory {other:?}"),
        }
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut config = PollerConfig::default();
        config.ssh.password = Some("hunter2".into());
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("hunter2"));
        assert_eq!(config.credentials().password, "hunter2");
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults_and_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PollerConfig::load_from(&dir.path().join("nope.toml")).await.unwrap();
        assert_eq!(missing.polling.probe_timeout_secs, 10);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[polling]\nconcurrency_limit = \"many\"\n").unwrap();
        assert!(matches!(PollerConfig::load_from(&bad).await, Err(ConfigError::Parse { .. })));
    }
}
