//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BIZLINK_CONFIG";

/// Complete service configuration
///
/// Every field has a compiled default so an absent or partial TOML file
/// still yields a runnable service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Redis connection URL; the in-process cache is used when unset
    pub redis_url: Option<String>,
    pub feed: FeedTuning,
    pub cache_ttl: CacheTtls,
    pub matching: MatchingDefaults,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5780".to_string(),
            database_path: default_data_dir().join("bizlink.db"),
            redis_url: None,
            feed: FeedTuning::default(),
            cache_ttl: CacheTtls::default(),
            matching: MatchingDefaults::default(),
        }
    }
}

/// Feed assembly knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedTuning {
    /// Page size when the request omits `limit`
    pub default_limit: usize,
    /// Upper bound applied to `limit`
    pub max_limit: usize,
    /// Upper bound applied to `offset`; bounds the per-kind overfetch
    pub max_offset: usize,
    /// Overfetch multiplier applied per kind before post-fetch filtering
    pub buffer_factor: usize,
    /// Longest allowed run of one content kind after diversification
    pub max_seq: usize,
}

impl Default for FeedTuning {
    fn default() -> Self {
        Self {
            default_limit: 40,
            max_limit: 100,
            max_offset: 1000,
            buffer_factor: 2,
            max_seq: 1,
        }
    }
}

/// Cache time-to-live per resource, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub feed_secs: u64,
    pub meta_secs: u64,
    pub suggestions_secs: u64,
    pub user_items_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            feed_secs: 300,
            meta_secs: 3600,
            suggestions_secs: 600,
            user_items_secs: 600,
        }
    }
}

/// Defaults for people matching when the request does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingDefaults {
    pub bidirectional: bool,
    /// `reciprocal` or `simple`
    pub formula: String,
    pub suggestions_limit: usize,
}

impl Default for MatchingDefaults {
    fn default() -> Self {
        Self {
            bidirectional: true,
            formula: "reciprocal".to_string(),
            suggestions_limit: 20,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a file, falling back to defaults when absent
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using compiled defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument
/// 2. `BIZLINK_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/bizlink/config.toml`), if present
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("bizlink").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bizlink"))
        .unwrap_or_else(|| PathBuf::from("./bizlink_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.feed.default_limit, 40);
        assert_eq!(config.feed.buffer_factor, 2);
        assert_eq!(config.feed.max_seq, 1);
        assert_eq!(config.cache_ttl.feed_secs, 300);
        assert_eq!(config.cache_ttl.meta_secs, 3600);
        assert_eq!(config.cache_ttl.suggestions_secs, 600);
        assert_eq!(config.cache_ttl.user_items_secs, 600);
        assert_eq!(config.matching.formula, "reciprocal");
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"

            [feed]
            default_limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.feed.default_limit, 10);
        assert_eq!(config.feed.max_limit, 100);
        assert_eq!(config.feed.max_offset, 1000);
        assert_eq!(config.cache_ttl.feed_secs, 300);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ServiceConfig::from_toml_str("feed = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
