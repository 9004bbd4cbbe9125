//! Persisted engine configuration.
//!
//! Stored as JSON under the user config directory: API URL and token,
//! plus engine tuning. CLI flags override anything loaded from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{SyncError, SyncOptions, DEFAULT_CACHE_TTL_HOURS, DEFAULT_CONCURRENCY};
use crate::reconcile::ConflictPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub api_url: String,
    pub token: String,
    #[serde(default = "default_ttl_hours")]
    pub cache_ttl_hours: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_ttl_hours() -> u64 {
    DEFAULT_CACHE_TTL_HOURS
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "https://partdb.example.com/api".to_string(),
            token: String::new(),
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            concurrency: DEFAULT_CONCURRENCY,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Engine options corresponding to this configuration.
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            concurrency: self.concurrency.max(1),
            cache_ttl: Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600)),
            conflict_policy: self.conflict_policy,
            dry_run: false,
        }
    }
}

/// Default config file location: `<config_dir>/partsync/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("partsync").join("config.json"))
}

/// Default cache database location: `<cache_dir>/partsync/cache`.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("partsync").join("cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = SyncConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = SyncConfig {
            api_url: "https://inventory.local/api".to_string(),
            token: "secret".to_string(),
            cache_ttl_hours: 12,
            concurrency: 8,
            conflict_policy: ConflictPolicy::PreferRemote,
        };
        config.save(&path).unwrap();

        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "https://x/api", "token": "t"}"#).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.cache_ttl_hours, DEFAULT_CACHE_TTL_HOURS);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.conflict_policy, ConflictPolicy::PreferLocal);
    }

    #[test]
    fn options_survive_absurd_ttl_hours() {
        let config = SyncConfig {
            cache_ttl_hours: u64::MAX,
            ..SyncConfig::default()
        };
        assert_eq!(config.options().cache_ttl, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn options_floor_concurrency_at_one() {
        let config = SyncConfig {
            concurrency: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.options().concurrency, 1);
    }
}
