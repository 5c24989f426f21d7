use crate::aggregator::AggregationStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV: &str = "NETWATCH_KERNEL_CONFIG";
pub const API_KEY_ENV: &str = "NETWATCH_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    pub database_path: PathBuf,
    pub cache_ttl_secs: u64,
    pub strategy: AggregationStrategy,
    /// Filtre les alias retirés de l'inventaire
    pub inventory_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            database_path: PathBuf::from("./data/history.db"),
            cache_ttl_secs: 600,
            strategy: AggregationStrategy::Windowed,
            inventory_url: None,
            api_key: None,
        }
    }
}

impl KernelConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = load_config_from(Path::new(&path)).await;
    if cfg.api_key.is_none() {
        cfg.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
    }
    cfg
}

pub async fn load_config_from(path: &Path) -> KernelConfig {
    if !path.exists() {
        warn!(path = %path.display(), "no kernel config, using defaults");
        return KernelConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), "invalid kernel config, using defaults: {e}");
        KernelConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yaml_overrides_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.yaml");
        std::fs::write(
            &path,
            "listen: 127.0.0.1:9000\nstrategy: latest\ncache_ttl_secs: 30\ninventory_url: http://inventory.lan:5010/ipunit\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).await;
        assert_eq!(cfg.listen, "127.0.0.1:9000");
        assert_eq!(cfg.strategy, AggregationStrategy::Latest);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(30));
        assert_eq!(cfg.database_path, PathBuf::from("./data/history.db"));
        assert!(cfg.api_key.is_none());
    }

    #[tokio::test]
    async fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config_from(&dir.path().join("absent.yaml")).await;
        assert_eq!(missing.cache_ttl_secs, 600);

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "strategy: [not, a, strategy]\n").unwrap();
        let cfg = load_config_from(&bad).await;
        assert_eq!(cfg.strategy, AggregationStrategy::Windowed);
        assert_eq!(cfg.listen, "0.0.0.0:8080");
    }
}
