//! Configuration: a `Config` struct loadable from a JSON file with
//! environment-variable overrides.

mod watcher;

pub use watcher::ConfigWatcher;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{PredictorError, Result};

const ENV_PREFIX: &str = "SHELLHINT_";

/// All recognized configuration options. Every field is overridable by
/// `SHELLHINT_<UPPER_SNAKE_FIELD>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub max_prefix_len: usize,
    pub max_buckets: usize,
    pub max_entries_per_bucket: usize,
    pub max_returned: usize,
    pub default_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub seeding: bool,
    pub endpoint_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_prefix_len: 50,
            max_buckets: 1000,
            // Small enough to keep a bucket's FIFO scan cheap while still
            // holding a handful of sibling commands per prefix.
            max_entries_per_bucket: 5,
            max_returned: 5,
            default_ttl_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
            timeout_ms: 15,
            connect_timeout_ms: 1000,
            seeding: false,
            endpoint_name: "LLMEmpoweredCommandPredictor.SuggestionService".to_string(),
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellhint")
            .join("config.json")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(PredictorError::Io)?;
        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|e| PredictorError::Config(format!("invalid config at {path:?}: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from the default path, falling back to defaults (with env
    /// overrides applied) when the file does not exist.
    pub fn load() -> Self {
        let path = Self::path();
        match Self::load_from_path(&path) {
            Ok(config) => config,
            Err(_) => {
                let mut config = Config::default();
                config.apply_env_overrides();
                config
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! override_field {
            ($field:ident, $parse:expr) => {
                if let Ok(raw) = std::env::var(format!(
                    "{ENV_PREFIX}{}",
                    stringify!($field).to_uppercase()
                )) {
                    if let Some(value) = $parse(raw) {
                        self.$field = value;
                    }
                }
            };
        }
        override_field!(max_prefix_len, |s: String| s.parse().ok());
        override_field!(max_buckets, |s: String| s.parse().ok());
        override_field!(max_entries_per_bucket, |s: String| s.parse().ok());
        override_field!(max_returned, |s: String| s.parse().ok());
        override_field!(default_ttl_secs, |s: String| s.parse().ok());
        override_field!(cleanup_interval_secs, |s: String| s.parse().ok());
        override_field!(timeout_ms, |s: String| s.parse().ok());
        override_field!(connect_timeout_ms, |s: String| s.parse().ok());
        override_field!(seeding, |s: String| s.parse().ok());
        override_field!(endpoint_name, |s: String| Some(s));
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_prefix_len: self.max_prefix_len,
            max_buckets: self.max_buckets,
            max_entries_per_bucket: self.max_entries_per_bucket,
            max_returned: self.max_returned,
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            seeding: self.seeding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.max_prefix_len, 50);
        assert_eq!(config.max_buckets, 1000);
        assert_eq!(config.max_returned, 5);
        assert_eq!(config.default_ttl_secs, 1800);
        assert_eq!(config.cleanup_interval_secs, 300);
        assert_eq!(config.timeout_ms, 15);
        assert_eq!(config.connect_timeout_ms, 1000);
    }

    #[test]
    fn load_from_path_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn load_from_path_applies_overrides_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_buckets": 42}"#).unwrap();
        std::env::set_var("SHELLHINT_MAX_RETURNED", "9");
        let config = Config::load_from_path(&path).unwrap();
        std::env::remove_var("SHELLHINT_MAX_RETURNED");
        assert_eq!(config.max_buckets, 42);
        assert_eq!(config.max_returned, 9);
    }
}
