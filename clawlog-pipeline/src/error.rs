//! Error types for clawlog-pipeline.

use std::path::PathBuf;

use thiserror::Error;

use clawlog_core::{ConfigError, LockError, StateError};
use clawlog_engine::SummarizeError;

/// Everything that can abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("state file error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend failed; no state was changed.
    #[error("summary failed: {0}")]
    Summarize(#[from] SummarizeError),

    /// Reading or writing the career log.
    #[error("career log I/O error at {path}: {source}")]
    Journal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`PipelineError::Journal`].
pub(crate) fn journal_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Journal {
        path: path.into(),
        source,
    }
}
