//! claw-log core library — commit-tracking state, run lock, configuration.
//!
//! Public API surface:
//! - [`types`] — repository keys and persisted records
//! - [`state`] — crash-safe JSON state file (load / merge-save / quarantine)
//! - [`lock`] — single-instance run lock backed by a PID marker file
//! - [`liveness`] — process liveness probing behind a trait
//! - [`config`] — `config.yaml` + environment overrides
//! - [`paths`] — storage layout under the injected root directory

pub mod atomic;
pub mod config;
pub mod error;
pub mod liveness;
pub mod lock;
pub mod paths;
pub mod state;
pub mod types;

pub use config::{Config, Provider};
pub use error::{ConfigError, LockError, StateError};
pub use liveness::{OsProcessProbe, ProcessLivenessChecker};
pub use lock::{Acquisition, LockHolder, RunLock, RunLockGuard, MAX_ACQUIRE_ATTEMPTS};
pub use state::{LoadOutcome, StateFile};
pub use types::{PendingUpdates, ProjectRecord, RepoKey, StateStore, STATE_VERSION};
