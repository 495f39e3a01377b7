//! CLI command implementations.

pub mod attributes;
pub mod check;
pub mod config;
pub mod filter;
pub mod seed;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use warden::{
    ConfigLoader, JsonFilePolicyStore, JsonFileSubjectStore, MemoryCache, PermissionFacade,
    WardenConfig,
};

/// Facade over the JSON file stores.
pub type FileFacade = PermissionFacade<MemoryCache, JsonFilePolicyStore, JsonFileSubjectStore>;

/// Loads configuration from `path`, or from the usual locations.
pub fn load_config(path: Option<&Path>) -> Result<WardenConfig> {
    match path {
        Some(path) => {
            let mut config = WardenConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            if let Some(base) = path.parent() {
                config.resolve_paths(base);
            }
            Ok(config)
        }
        None => ConfigLoader::new().load(),
    }
}

/// Opens a facade over the policy and subject files.
///
/// Explicit paths win over `[store]` settings.
pub fn open_facade(
    config: &WardenConfig,
    policies: Option<PathBuf>,
    subjects: Option<PathBuf>,
) -> Result<FileFacade> {
    let policies = policies.unwrap_or_else(|| config.store.policies.clone());
    let subjects = subjects.unwrap_or_else(|| config.store.subjects.clone());
    anyhow::ensure!(policies.exists(), "Policy file not found: {}", policies.display());
    anyhow::ensure!(subjects.exists(), "Subject file not found: {}", subjects.display());

    Ok(PermissionFacade::new(
        MemoryCache::new(config.cache.capacity),
        JsonFilePolicyStore::new(policies),
        JsonFileSubjectStore::new(subjects),
        config,
    ))
}

/// Reads and parses a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}
