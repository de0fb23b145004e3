//! Commit-tracking state file.
//!
//! # Guarantees
//!
//! - [`StateFile::load`] never fails. A missing file is an empty store; one
//!   that is not JSON, or lacks a `projects` object, is quarantined to
//!   `<file>.bak.<unix_seconds>` and replaced by an empty store in memory.
//!   Mistyped fields inside records fall back to defaults (see
//!   [`crate::types`]) and never cost the rest of the file.
//! - [`StateFile::save`] re-reads the file immediately before merging, so
//!   records for repositories outside `pending` survive even if the file
//!   changed since the caller's `load`.
//! - Every replacement of the file goes through [`crate::atomic`]: temp
//!   sibling, fsync, rename.
//!
//! # API pattern
//!
//! The store is constructed from an explicit storage root
//! ([`StateFile::at`]); tests point it at a `TempDir`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::atomic;
use crate::error::{state_io, StateError};
use crate::paths;
use crate::types::{PendingUpdates, RepoKey, StateStore};

/// Result of reading the state file.
#[derive(Debug)]
pub enum LoadOutcome {
    /// No state file yet.
    Missing,
    /// Parsed successfully.
    Loaded(StateStore),
    /// Content was not a valid state document. `backup` is where it was
    /// moved, or `None` if the rename failed.
    Corrupted {
        reason: String,
        backup: Option<PathBuf>,
    },
    /// The file exists but could not be read (permissions, not a file…).
    /// It is left in place.
    Unreadable { source: std::io::Error },
}

impl LoadOutcome {
    /// The usable store: the parsed one, or an empty store for every
    /// other outcome.
    pub fn into_store(self) -> StateStore {
        match self {
            LoadOutcome::Loaded(store) => store,
            _ => StateStore::default(),
        }
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, LoadOutcome::Corrupted { .. })
    }
}

/// Handle on `<root>/commit_state.json`.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

enum RawState {
    Missing,
    Valid(StateStore),
    Invalid(String),
}

impl StateFile {
    /// State file under the storage root.
    pub fn at(root: &Path) -> Self {
        Self::with_path(paths::state_file_path(root))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file. See [`LoadOutcome`]; the caller usually wants
    /// [`LoadOutcome::into_store`].
    pub fn load(&self) -> LoadOutcome {
        match self.read_raw() {
            Ok(RawState::Missing) => LoadOutcome::Missing,
            Ok(RawState::Valid(store)) => LoadOutcome::Loaded(store),
            Ok(RawState::Invalid(reason)) => {
                let backup = self.quarantine(&reason);
                LoadOutcome::Corrupted { reason, backup }
            }
            Err(source) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %source,
                    "state file unreadable; continuing with empty state",
                );
                LoadOutcome::Unreadable { source }
            }
        }
    }

    /// Merge `pending` into the current on-disk state, stamped with the
    /// current time, and persist it atomically.
    pub fn save(&self, pending: &PendingUpdates) -> Result<StateStore, StateError> {
        self.save_at(pending, Utc::now())
    }

    /// [`save`](Self::save) with an explicit timestamp.
    ///
    /// An empty `pending` writes nothing; the file is only created by a
    /// save that records something.
    pub fn save_at(
        &self,
        pending: &PendingUpdates,
        now: DateTime<Utc>,
    ) -> Result<StateStore, StateError> {
        let mut current = self.read_for_update()?;
        if pending.is_empty() {
            return Ok(current);
        }
        for (key, hash) in pending {
            current.record(key.clone(), hash.clone(), now);
        }
        self.persist(&current)?;
        tracing::info!(
            path = %self.path.display(),
            updated = pending.len(),
            tracked = current.len(),
            "state saved",
        );
        Ok(current)
    }

    /// Remove records for `keys` (read-merge-write). Returns the keys that
    /// were actually present.
    pub fn forget(&self, keys: &[RepoKey]) -> Result<Vec<RepoKey>, StateError> {
        let mut current = self.read_for_update()?;
        let removed: Vec<RepoKey> = keys
            .iter()
            .filter(|key| current.forget(key))
            .cloned()
            .collect();
        if !removed.is_empty() {
            self.persist(&current)?;
        }
        Ok(removed)
    }

    /// Manual reset: move the whole state file aside as a backup.
    ///
    /// Returns the backup path, or `None` if there was no state file.
    pub fn reset(&self) -> Result<Option<PathBuf>, StateError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.next_backup_path();
        fs::rename(&self.path, &backup).map_err(|e| state_io(&self.path, e))?;
        tracing::info!(backup = %backup.display(), "state reset");
        Ok(Some(backup))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn read_raw(&self) -> std::io::Result<RawState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(RawState::Missing),
            Err(err) => return Err(err),
        };
        Ok(match serde_json::from_slice::<StateStore>(&bytes) {
            Ok(store) => RawState::Valid(store),
            Err(err) => RawState::Invalid(err.to_string()),
        })
    }

    /// Read for a write: corruption is quarantined and treated as empty,
    /// but I/O failures propagate so an unreadable file is never replaced.
    fn read_for_update(&self) -> Result<StateStore, StateError> {
        match self.read_raw().map_err(|e| state_io(&self.path, e))? {
            RawState::Missing => Ok(StateStore::default()),
            RawState::Valid(store) => Ok(store),
            RawState::Invalid(reason) => {
                self.quarantine(&reason);
                Ok(StateStore::default())
            }
        }
    }

    fn persist(&self, store: &StateStore) -> Result<(), StateError> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir).map_err(|e| state_io(dir, e))?;
        }
        let mut json = serde_json::to_vec_pretty(store)?;
        json.push(b'\n');
        atomic::write_atomic_private(&self.path, &json).map_err(|e| state_io(&self.path, e))
    }

    fn quarantine(&self, reason: &str) -> Option<PathBuf> {
        let backup = self.next_backup_path();
        match fs::rename(&self.path, &backup) {
            Ok(()) => {
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    reason,
                    "state file corrupted; moved aside and starting fresh",
                );
                Some(backup)
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    reason,
                    "state file corrupted and could not be moved aside; starting fresh",
                );
                None
            }
        }
    }

    /// `<file>.bak.<unix_seconds>`, bumping the seconds past any backup
    /// that already exists so an earlier quarantine is never overwritten.
    fn next_backup_path(&self) -> PathBuf {
        let mut secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        loop {
            let candidate = backup_path(&self.path, secs);
            if !candidate.exists() {
                return candidate;
            }
            secs += 1;
        }
    }
}

/// Free-function form of [`StateStore::last_hash`].
pub fn get_last_hash(state: &StateStore, key: &RepoKey) -> Option<String> {
    state.last_hash(key).map(str::to_owned)
}

fn backup_path(path: &Path, secs: u64) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.bak.{secs}"))
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    set_dir_permissions(dir)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
