//! Where configuration files are looked up.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Project-level settings, committed alongside the policy files.
pub const PROJECT_FILE: &str = "warden.toml";

/// Per-checkout overrides, kept out of version control.
pub const LOCAL_FILE: &str = "warden.local.toml";

/// `~/.config/warden/config.toml` on Linux; `None` when the platform has no
/// home directory to anchor it.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("dev", "Warden", "warden").map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn project_config_file(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_FILE)
}

pub fn local_config_file(project_dir: &Path) -> PathBuf {
    project_dir.join(LOCAL_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn user_file_lives_under_the_warden_directory() {
        if let Some(file) = user_config_file() {
            assert!(file.ends_with("config.toml"));
            assert!(file.parent().is_some_and(|dir| dir.ends_with("warden")));
        }
    }

    #[test]
    fn local_file_sits_next_to_project_file() {
        let temp = tempdir().unwrap();
        let project = project_config_file(temp.path());
        let local = local_config_file(temp.path());
        assert_eq!(project.parent(), local.parent());
        assert_eq!(project.file_name().unwrap(), "warden.toml");
        assert_eq!(local.file_name().unwrap(), "warden.local.toml");
    }
}
