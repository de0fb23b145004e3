//! Error types for clawlog-collect.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while extracting work from a repository.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The configured path does not exist.
    #[error("path not found: {path}; check `project_paths` in config.yaml")]
    PathNotFound { path: PathBuf },

    /// The path exists but is not inside a git work tree.
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    /// `git` could not be started at all.
    #[error("failed to run git in {path}: {source}; is git installed and on PATH?")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `git` ran and exited non-zero.
    #[error("`git {command}` failed in {path}: {stderr}")]
    Git {
        path: PathBuf,
        command: String,
        stderr: String,
    },
}
