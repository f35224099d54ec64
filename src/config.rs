//! Layered configuration: YAML file merged with `FLEETSCOPE_`-prefixed
//! environment variables (`FLEETSCOPE_MANAGER__PASSWORD` and friends).

use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub manager: ManagerConfig,
    pub collector: CollectorConfig,
    pub store: StoreConfig,
}

/// Connection settings for the management-plane server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Base URL, e.g. `https://mgmt.example.com`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Administrative domain whose device registry is collected.
    pub adom: String,
    /// Accept self-signed certificates. Management planes in branch
    /// deployments rarely carry a public CA chain.
    pub insecure: bool,
    /// Per-request timeout in seconds. A hung call becomes a transport
    /// failure when this elapses, freeing its worker slot.
    pub timeout_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            adom: "root".to_string(),
            insecure: false,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum devices fetched concurrently. Each in-flight device adds
    /// three device-local sub-queries, so peak load on the management
    /// server is three times this value.
    pub max_concurrent_devices: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_devices: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Location of the persisted status document.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: dir.join("fleetscope").join("status.json"),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join("fleetscope").join("config.yaml")
    }
}

/// Load configuration. A missing file is not an error; defaults and
/// environment variables still apply.
pub fn load(path: Option<&str>) -> Result<Config> {
    let path = path.map(PathBuf::from).unwrap_or_else(Config::default_path);

    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if path.exists() {
        figment = figment.merge(Yaml::file(&path));
    }

    figment
        .merge(Env::prefixed("FLEETSCOPE_").split("__"))
        .extract()
        .with_context(|| format!("loading configuration from {}", path.display()))
}
