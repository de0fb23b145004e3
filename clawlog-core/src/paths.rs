//! Storage layout.
//!
//! ```text
//! <root>/                       (default: ~/.claw-log, mode 0700)
//!   config.yaml
//!   commit_state.json           (mode 0600)
//!   commit_state.json.bak.<ts>  (quarantined copies)
//!   run.lock                    (PID marker while a run is active)
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const ROOT_DIR: &str = ".claw-log";
pub const STATE_FILE: &str = "commit_state.json";
pub const LOCK_FILE: &str = "run.lock";
pub const CONFIG_FILE: &str = "config.yaml";

pub fn default_root(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

pub fn state_file_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve the storage root: an explicit override wins, otherwise
/// `~/.claw-log` from `dirs::home_dir()`.
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(root) => Ok(root),
        None => dirs::home_dir()
            .map(|home| default_root(&home))
            .ok_or(ConfigError::HomeNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted() {
        let root = default_root(Path::new("/home/dev"));
        assert_eq!(root, PathBuf::from("/home/dev/.claw-log"));
        assert!(state_file_path(&root).ends_with(".claw-log/commit_state.json"));
        assert!(lock_path(&root).ends_with(".claw-log/run.lock"));
        assert!(config_path(&root).ends_with(".claw-log/config.yaml"));
    }

    #[test]
    fn explicit_root_wins() {
        let root = resolve_root(Some(PathBuf::from("/tmp/x"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/x"));
    }
}
