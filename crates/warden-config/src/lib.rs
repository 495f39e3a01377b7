//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (WARDEN_* prefix, `__` between section and key)
//! 3. warden.local.toml (gitignored, local overrides)
//! 4. warden.toml (git-tracked, project config)
//! 5. ~/.config/warden/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Main Warden configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

/// Cache keys and lifetimes for the policy set and subject bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub policy_ttl_secs: u64,
    pub subject_ttl_secs: u64,
    pub policy_key: String,
    pub subject_key_prefix: String,
    /// Maximum entries held by the in-process cache.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy_ttl_secs: 1800,
            subject_ttl_secs: 1800,
            policy_key: "abac_policies".to_string(),
            subject_key_prefix: "abac_subject:".to_string(),
            capacity: 4096,
        }
    }
}

impl CacheConfig {
    pub fn policy_ttl(&self) -> Duration {
        Duration::from_secs(self.policy_ttl_secs)
    }

    pub fn subject_ttl(&self) -> Duration {
        Duration::from_secs(self.subject_ttl_secs)
    }

    /// Cache key for one subject's attribute bundle.
    pub fn subject_key(&self, subject_id: impl std::fmt::Display) -> String {
        format!("{}{subject_id}", self.subject_key_prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// JSON files backing the policy and subject stores of the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub policies: PathBuf,
    pub subjects: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            policies: PathBuf::from("policies.json"),
            subjects: PathBuf::from("subjects.json"),
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file, without merging other sources.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            cache: CacheConfig {
                policy_ttl_secs: 5,
                subject_ttl_secs: 5,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
            ..Default::default()
        }
    }

    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                level: "warn".to_string(),
            },
            ..Default::default()
        }
    }

    /// Rejects settings the cache cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::invalid("cache.capacity", "must be greater than zero"));
        }
        if self.cache.policy_key.is_empty() {
            return Err(ConfigError::invalid("cache.policy_key", "must not be empty"));
        }
        if self.cache.policy_key.starts_with(&self.cache.subject_key_prefix) {
            return Err(ConfigError::invalid(
                "cache.policy_key",
                "must not fall under cache.subject_key_prefix",
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.store.policies.is_relative() {
            self.store.policies = base.join(&self.store.policies);
        }

        if self.store.subjects.is_relative() {
            self.store.subjects = base.join(&self.store.subjects);
        }
    }
}
