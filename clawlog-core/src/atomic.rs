//! Temp-file + fsync + rename writes.
//!
//! The temporary file lives next to the target (same filesystem, so the
//! rename cannot fail with EXDEV) and carries the writer's PID so two
//! processes never share one. Readers observe either the old or the new
//! content; a crash before the rename leaves the target untouched.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// `<target>.<pid>.tmp` — the sibling a write in progress goes to.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", std::process::id()))
}

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    write_with_mode(path, contents, false)
}

/// Like [`write_atomic`], but the file is readable by the owner only (`0600`).
pub fn write_atomic_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    write_with_mode(path, contents, true)
}

fn write_with_mode(path: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    let tmp = tmp_path_for(path);
    let result = write_synced(&tmp, contents, private).and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    sync_parent(path);
    Ok(())
}

fn write_synced(tmp: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if private {
        owner_only(&mut options);
    }

    let mut file = options.open(tmp)?;
    file.write_all(contents)?;
    file.flush()?;
    file.sync_all()
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
}
#[cfg(not(unix))]
fn owner_only(_options: &mut OpenOptions) {}

/// Persist the rename itself. Best effort: not every platform can open a
/// directory for syncing.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.md");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!tmp_path_for(&path).exists(), "tmp must be renamed away");
    }

    #[test]
    fn failed_rename_removes_tmp() {
        let dir = TempDir::new().unwrap();
        // Target is a non-empty directory: rename over it fails.
        let path = dir.path().join("occupied");
        fs::create_dir_all(path.join("child")).unwrap();

        assert!(write_atomic(&path, b"data").is_err());
        assert!(!tmp_path_for(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn private_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        write_atomic_private(&path, b"{}").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn tmp_sibling_carries_pid() {
        let tmp = tmp_path_for(Path::new("/x/commit_state.json"));
        let expected = format!("commit_state.json.{}.tmp", std::process::id());
        assert_eq!(tmp, Path::new("/x").join(expected));
    }
}
