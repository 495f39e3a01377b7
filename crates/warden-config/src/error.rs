//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not valid warden TOML: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// A setting the cache or stores cannot run with.
    #[error("invalid setting {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(setting: &'static str, reason: &'static str) -> Self {
        Self::Invalid { setting, reason }
    }
}
