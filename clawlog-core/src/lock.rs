//! Single-instance run lock.
//!
//! The lock is a marker file (`<root>/run.lock`) holding the owner's PID in
//! decimal. The PID is written to a private sibling first and published with
//! a hard link, which fails atomically when the marker exists. A marker is
//! therefore never observed empty or half-written.
//!
//! ```text
//! UNLOCKED --acquire--> LOCKED --release / guard drop--> UNLOCKED
//! ```
//!
//! A marker left by a dead process (or holding garbage) is stale. It is
//! renamed aside, checked again, removed, and acquisition retried, at most
//! [`MAX_ACQUIRE_ATTEMPTS`] times. A live holder yields
//! [`Acquisition::AlreadyRunning`] immediately; the lock never waits. It is
//! not reentrant: a process that acquires twice sees its own PID and is told
//! an instance is already running.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{lock_io, LockError};
use crate::liveness::{OsProcessProbe, ProcessLivenessChecker};
use crate::paths;

/// Upper bound on stale-marker reclaim attempts per acquisition.
pub const MAX_ACQUIRE_ATTEMPTS: usize = 5;

/// Distinguishes sibling files created by threads of one process.
static SIBLING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Outcome of [`RunLock::acquire`].
#[derive(Debug)]
pub enum Acquisition {
    /// This process now holds the lock until the guard is released or dropped.
    Acquired(RunLockGuard),
    /// Another instance holds the lock. `pid` is `None` when the marker kept
    /// reappearing without a readable PID until the retry budget ran out.
    AlreadyRunning { pid: Option<u32> },
}

impl Acquisition {
    /// Human-readable contention message; `None` when the lock was acquired.
    pub fn message(&self) -> Option<String> {
        match self {
            Acquisition::Acquired(_) => None,
            Acquisition::AlreadyRunning { pid: Some(pid) } => Some(format!(
                "claw-log is already running (pid {pid}); wait for it to finish"
            )),
            Acquisition::AlreadyRunning { pid: None } => Some(
                "claw-log is already running (lock is being held by another instance); wait for it to finish"
                    .to_string(),
            ),
        }
    }
}

/// Who currently holds the marker, as seen by [`RunLock::holder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    /// `None` when the marker content is not a PID.
    pub pid: Option<u32>,
    pub alive: bool,
}

/// The run lock for one storage root.
#[derive(Debug, Clone)]
pub struct RunLock<C = OsProcessProbe> {
    path: PathBuf,
    checker: C,
}

impl RunLock<OsProcessProbe> {
    /// Lock marker under the storage root, probing the real OS.
    pub fn at(root: &Path) -> Self {
        Self::with_checker(paths::lock_path(root), OsProcessProbe)
    }
}

impl<C: ProcessLivenessChecker> RunLock<C> {
    pub fn with_checker(path: impl Into<PathBuf>, checker: C) -> Self {
        Self {
            path: path.into(),
            checker,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock for the current process.
    ///
    /// Errors only on filesystem failures other than "marker exists";
    /// contention is reported as [`Acquisition::AlreadyRunning`].
    pub fn acquire(&self) -> Result<Acquisition, LockError> {
        let mut last_seen = None;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|err| lock_io(dir, err))?;
        }

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            match self.create_marker() {
                Ok(()) => {
                    tracing::debug!(path = %self.path.display(), "run lock acquired");
                    return Ok(Acquisition::Acquired(RunLockGuard {
                        path: self.path.clone(),
                        released: false,
                    }));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(lock_io(&self.path, err)),
            }

            let seen = match fs::read(&self.path) {
                Ok(contents) => contents,
                // Released between our create attempt and this read.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(lock_io(&self.path, err)),
            };
            let recorded = parse_pid_bytes(&seen);

            if let Some(pid) = recorded {
                last_seen = Some(pid);
                if self.checker.is_alive(pid) {
                    tracing::warn!(pid, "another claw-log instance is running");
                    return Ok(Acquisition::AlreadyRunning { pid: Some(pid) });
                }
            }

            tracing::info!(
                pid = ?recorded,
                attempt,
                path = %self.path.display(),
                "removing stale run lock",
            );
            self.reclaim(&seen)?;
        }

        tracing::warn!(
            attempts = MAX_ACQUIRE_ATTEMPTS,
            "run lock kept reappearing; treating as already running",
        );
        Ok(Acquisition::AlreadyRunning { pid: last_seen })
    }

    /// Remove the marker unconditionally. A missing marker is fine.
    pub fn release(&self) -> Result<(), LockError> {
        remove_if_present(&self.path)
    }

    /// Inspect the marker without changing it. `None` when unlocked.
    pub fn holder(&self) -> Result<Option<LockHolder>, LockError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let pid = parse_pid(&contents);
                let alive = pid.is_some_and(|pid| self.checker.is_alive(pid));
                Ok(Some(LockHolder { pid, alive }))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(lock_io(&self.path, err)),
        }
    }

    /// Remove the marker only if its holder is dead.
    ///
    /// Returns the removed holder, `None` when there was no marker, and
    /// [`LockError::HolderAlive`] when the holder is still running.
    pub fn clear_stale(&self) -> Result<Option<LockHolder>, LockError> {
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let seen = match fs::read(&self.path) {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(lock_io(&self.path, err)),
            };
            let pid = parse_pid_bytes(&seen);
            let alive = pid.is_some_and(|pid| self.checker.is_alive(pid));
            if let (Some(pid), true) = (pid, alive) {
                return Err(LockError::HolderAlive { pid });
            }
            if self.reclaim(&seen)? {
                return Ok(Some(LockHolder { pid, alive }));
            }
        }
        Ok(None)
    }

    /// Publish a marker holding our PID. `AlreadyExists` means contention.
    fn create_marker(&self) -> io::Result<()> {
        let staged = self.sibling("tmp");
        let published = write_pid(&staged).and_then(|()| fs::hard_link(&staged, &self.path));
        let _ = fs::remove_file(&staged);
        published
    }

    /// Remove a marker previously read as `seen` and judged stale.
    ///
    /// The marker is renamed aside before it is checked, so a holder that
    /// replaced it in the meantime gets its marker back instead of losing it.
    /// Returns `true` when the stale marker was removed.
    fn reclaim(&self, seen: &[u8]) -> Result<bool, LockError> {
        let aside = self.sibling("stale");
        match fs::rename(&self.path, &aside) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(lock_io(&self.path, err)),
        }

        let moved = match fs::read(&aside) {
            Ok(contents) => contents,
            Err(err) => {
                let _ = fs::remove_file(&aside);
                return Err(lock_io(&aside, err));
            }
        };
        if moved == seen {
            remove_if_present(&aside)?;
            return Ok(true);
        }

        tracing::debug!(path = %self.path.display(), "run lock changed during reclaim; restoring");
        let restored = fs::hard_link(&aside, &self.path);
        let _ = fs::remove_file(&aside);
        match restored {
            Ok(()) => Ok(false),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(lock_io(&self.path, err)),
        }
    }

    fn sibling(&self, tag: &str) -> PathBuf {
        let seq = SIBLING_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run.lock".to_string());
        self.path
            .with_file_name(format!("{name}.{}.{seq}.{tag}", std::process::id()))
    }
}

fn write_pid(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(std::process::id().to_string().as_bytes())?;
    file.sync_all()
}

/// Held lock. Dropping it removes the marker if it still names this
/// process; call [`release`](Self::release) to observe removal errors.
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
    released: bool,
}

impl RunLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        remove_own(&self.path)
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = remove_own(&self.path) {
            tracing::warn!(error = %err, "failed to remove run lock");
        }
    }
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse().ok()
}

fn parse_pid_bytes(contents: &[u8]) -> Option<u32> {
    std::str::from_utf8(contents).ok().and_then(parse_pid)
}

/// Remove the marker unless it has been taken over by another process.
fn remove_own(path: &Path) -> Result<(), LockError> {
    match fs::read(path) {
        Ok(contents) if parse_pid_bytes(&contents) != Some(std::process::id()) => {
            tracing::warn!(path = %path.display(), "run lock now names another process; leaving it");
            Ok(())
        }
        Ok(_) => remove_if_present(path),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(lock_io(path, err)),
    }
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(lock_io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn lock_with<C: ProcessLivenessChecker>(dir: &TempDir, checker: C) -> RunLock<C> {
        RunLock::with_checker(dir.path().join("run.lock"), checker)
    }

    #[test]
    fn acquire_writes_own_pid_and_drop_releases() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);

        let acquisition = lock.acquire().unwrap();
        assert!(acquisition.message().is_none());
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents, std::process::id().to_string());

        drop(acquisition);
        assert!(!lock.path().exists());
    }

    #[test]
    fn live_holder_is_reported_with_pid() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);
        fs::write(lock.path(), "4242").unwrap();

        let acquisition = lock.acquire().unwrap();
        assert!(matches!(acquisition, Acquisition::AlreadyRunning { pid: Some(4242) }));
        assert!(acquisition.message().unwrap().contains("4242"));
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), "4242");
    }

    #[test]
    fn not_reentrant() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::with_checker(dir.path().join("run.lock"), OsProcessProbe);

        let first = lock.acquire().unwrap();
        assert!(matches!(first, Acquisition::Acquired(_)));
        let second = lock.acquire().unwrap();
        assert!(matches!(second, Acquisition::AlreadyRunning { .. }));
        drop(second);
        assert!(lock.path().exists(), "contention must not remove the marker");
    }

    #[test]
    fn garbage_marker_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);
        fs::write(lock.path(), "not-a-pid").unwrap();

        let acquisition = lock.acquire().unwrap();
        assert!(matches!(acquisition, Acquisition::Acquired(_)));
    }

    #[test]
    fn dead_holder_is_probed_once_then_replaced() {
        let dir = TempDir::new().unwrap();
        let probes = Cell::new(0usize);
        let lock = lock_with(&dir, |_pid: u32| {
            probes.set(probes.get() + 1);
            false
        });
        fs::write(lock.path(), "99999").unwrap();

        let acquisition = lock.acquire().unwrap();
        assert!(matches!(acquisition, Acquisition::Acquired(_)));
        assert_eq!(probes.get(), 1);
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| false);
        lock.release().unwrap();

        let Acquisition::Acquired(guard) = lock.acquire().unwrap() else {
            panic!("expected lock");
        };
        guard.release().unwrap();
        lock.release().unwrap();
        assert!(!lock.path().exists());
    }

    #[test]
    fn holder_and_clear_stale() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |pid: u32| pid == 1);
        assert_eq!(lock.holder().unwrap(), None);

        fs::write(lock.path(), "1").unwrap();
        assert_eq!(
            lock.holder().unwrap(),
            Some(LockHolder { pid: Some(1), alive: true })
        );
        assert!(matches!(
            lock.clear_stale().unwrap_err(),
            LockError::HolderAlive { pid: 1 }
        ));

        fs::write(lock.path(), "2").unwrap();
        let cleared = lock.clear_stale().unwrap();
        assert_eq!(cleared, Some(LockHolder { pid: Some(2), alive: false }));
        assert!(!lock.path().exists());
    }

    #[test]
    fn reclaim_puts_back_a_marker_replaced_by_a_new_holder() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);
        fs::write(lock.path(), "4242").unwrap();

        // Judged stale while it still read "99999".
        assert!(!lock.reclaim(b"99999").unwrap());
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), "4242");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "aside copy must be cleaned up");
    }

    #[test]
    fn reclaim_of_vanished_marker_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| false);
        assert!(!lock.reclaim(b"99999").unwrap());
        assert!(!lock.path().exists());
    }

    #[test]
    fn guard_leaves_a_marker_that_names_another_process() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);
        let Acquisition::Acquired(guard) = lock.acquire().unwrap() else {
            panic!("expected lock");
        };
        fs::write(lock.path(), "4242").unwrap();

        guard.release().unwrap();
        assert_eq!(fs::read_to_string(lock.path()).unwrap(), "4242");
    }

    #[test]
    fn acquire_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let lock = lock_with(&dir, |_| true);
        let first = lock.acquire().unwrap();
        let second = lock.acquire().unwrap();
        assert!(matches!(second, Acquisition::AlreadyRunning { .. }));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("run.lock")]);
        drop(first);
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_location_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let lock = RunLock::with_checker(blocker.join("run.lock"), |_| true);

        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, LockError::Io { .. }), "got: {err}");
    }
}
