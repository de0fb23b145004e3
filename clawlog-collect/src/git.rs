//! Thin wrapper over the `git` CLI.
//!
//! Every command runs as `git -C <repo> …` with colour and external diff
//! drivers disabled so the output is plain unified diff text.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Local};

use crate::error::CollectError;

/// Generated or vendored files that only add noise to a summary.
pub const EXCLUDED_PATHSPECS: &[&str] = &[
    ":(exclude)package-lock.json",
    ":(exclude)yarn.lock",
    ":(exclude)pnpm-lock.yaml",
    ":(exclude)Cargo.lock",
    ":(exclude)*.map",
    ":(exclude)dist/",
    ":(exclude)build/",
    ":(exclude)node_modules/",
    ":(exclude).next/",
    ":(exclude).DS_Store",
];

/// A git work tree addressed by path.
#[derive(Debug, Clone, Copy)]
pub struct Git<'a> {
    dir: &'a Path,
}

impl<'a> Git<'a> {
    pub fn new(dir: &'a Path) -> Self {
        Self { dir }
    }

    /// Canonical top-level directory of the work tree containing `dir`.
    pub fn toplevel(&self) -> Result<PathBuf, CollectError> {
        let output = self.output(&["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            return Err(CollectError::NotARepository {
                path: self.dir.to_path_buf(),
            });
        }
        let top = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        Ok(top.canonicalize().unwrap_or(top))
    }

    /// Hash of `HEAD`, or `None` for a repository without commits.
    pub fn head(&self) -> Result<Option<String>, CollectError> {
        let output = self.output(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!hash.is_empty()).then_some(hash))
    }

    /// Whether `ancestor` is reachable from `descendant`. Unknown commits
    /// (garbage-collected, from another clone) count as "no".
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, CollectError> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        Ok(output.status.success())
    }

    /// Patches of commits in `since_hash..HEAD`.
    pub fn log_since_commit(&self, since_hash: &str) -> Result<String, CollectError> {
        let range = format!("{since_hash}..HEAD");
        self.diff_command(&["log", "-p", "--no-color", "--no-ext-diff", &range])
    }

    /// Patches of commits made after `since`.
    pub fn log_since_time(&self, since: DateTime<Local>) -> Result<String, CollectError> {
        let since = format!("--since={}", since.to_rfc3339());
        self.diff_command(&["log", "-p", "--no-color", "--no-ext-diff", &since])
    }

    /// Uncommitted changes (staged and unstaged) against `HEAD`, or against
    /// the empty index when there are no commits yet.
    pub fn uncommitted(&self, has_head: bool) -> Result<String, CollectError> {
        if has_head {
            self.diff_command(&["diff", "--no-color", "--no-ext-diff", "HEAD"])
        } else {
            self.diff_command(&["diff", "--no-color", "--no-ext-diff", "--cached"])
        }
    }

    /// Run a diff-producing command restricted to the work tree minus
    /// [`EXCLUDED_PATHSPECS`].
    fn diff_command(&self, args: &[&str]) -> Result<String, CollectError> {
        let mut full: Vec<&str> = args.to_vec();
        full.push("--");
        full.push(".");
        full.extend_from_slice(EXCLUDED_PATHSPECS);

        let output = self.output(&full)?;
        if !output.status.success() {
            return Err(CollectError::Git {
                path: self.dir.to_path_buf(),
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output(&self, args: &[&str]) -> Result<Output, CollectError> {
        tracing::debug!(repo = %self.dir.display(), args = ?args, "git");
        Command::new("git")
            .arg("-C")
            .arg(self.dir)
            .args(args)
            .output()
            .map_err(|source| CollectError::Spawn {
                path: self.dir.to_path_buf(),
                source,
            })
    }
}
