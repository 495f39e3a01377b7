//! Error types for the permission facade and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for access assertions.
pub type AccessResult<T> = Result<T, AccessError>;

/// The only error surfaced to callers of the facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The subject may not perform the action.
    #[error("permission denied: {action} on {resource_type}{}", resource_id.as_ref().map(|id| format!(" #{id}")).unwrap_or_default())]
    PermissionDenied {
        action: String,
        resource_type: String,
        resource_id: Option<String>,
    },
}

/// Failures of the key-value cache.
///
/// Never surfaced to callers; the facade falls back to the stores.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A thread panicked while holding the cache lock.
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Failures of the policy and subject stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading a store file.
    #[error("failed to read store at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store file is not valid JSON for its record type.
    #[error("failed to parse store at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
