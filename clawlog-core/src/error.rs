//! Error types for clawlog-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from persisting commit-tracking state.
///
/// Corruption is never an error here: it is reported through
/// [`crate::LoadOutcome::Corrupted`] and recovered by quarantine.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying I/O failure, with the path that failed.
    #[error("state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization of the in-memory store failed (write path only).
    #[error("state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the run lock.
///
/// Contention ("already running") is not an error; see
/// [`crate::Acquisition::AlreadyRunning`].
#[derive(Debug, Error)]
pub enum LockError {
    /// Any filesystem failure other than "marker already exists".
    #[error("run lock I/O error at {path}: {source}; check permissions and free space in the claw-log directory")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refused to remove a marker whose holder is still alive.
    #[error("run lock is held by live process {pid}; stop it first or wait for it to finish")]
    HolderAlive { pid: u32 },
}

/// Errors from loading `config.yaml` and environment overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown provider '{0}'; expected: gemini, openai")]
    InvalidProvider(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("no API key configured; set `api_key` in {path} or export CLAW_LOG_API_KEY")]
    MissingApiKey { path: PathBuf },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.claw-log/`.
    #[error("cannot determine home directory; set $HOME or pass --root")]
    HomeNotFound,
}

pub(crate) fn state_io(path: impl Into<PathBuf>, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn lock_io(path: impl Into<PathBuf>, source: std::io::Error) -> LockError {
    LockError::Io {
        path: path.into(),
        source,
    }
}
