//! Store configuration loaded from environment variables.
//!
//! - `SHOP_STORE` - path to the SQLite store file (default: platform data dir)
//! - `SHOP_NAME` - store name, also the name of the root category (default: `Products`)
//! - `SHOP_BUSY_TIMEOUT_MS` - how long a transaction waits on a locked store

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

pub const DEFAULT_STORE_NAME: &str = "Products";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store file. `None` opens a private in-memory store.
    pub path: Option<PathBuf>,
    pub name: String,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: DEFAULT_STORE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        let path = match std::env::var("SHOP_STORE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_store_path()?,
        };

        let name = std::env::var("SHOP_NAME").unwrap_or_else(|_| DEFAULT_STORE_NAME.to_string());

        let busy_timeout = std::env::var("SHOP_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BUSY_TIMEOUT);

        Ok(Self {
            path: Some(path),
            name,
            busy_timeout,
        })
    }

    /// In-memory configuration (for testing).
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "shop")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("store.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_has_no_path() {
        let config = StoreConfig::memory("Books");
        assert!(config.path.is_none());
        assert_eq!(config.name, "Books");
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn test_default_store_name() {
        assert_eq!(StoreConfig::default().name, "Products");
    }
}
