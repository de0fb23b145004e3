//! # clawlog-collect
//!
//! Extracts the day's work from git working trees.
//!
//! For each repository the collector gathers:
//! - committed work since the last summarized commit (or since local
//!   midnight when there is none, or when history was rewritten under it);
//! - uncommitted changes against `HEAD`.
//!
//! The pipeline talks to this crate through [`WorkSource`], so it can be
//! driven by fakes in tests.

pub mod error;
pub mod git;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use clawlog_core::RepoKey;

pub use error::CollectError;
pub use git::Git;

pub const COMMITTED_HEADER: &str = "=== [Past Commits] ===";
pub const UNCOMMITTED_HEADER: &str = "=== [Uncommitted Current Work] ===";

/// A located repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// State-map key: the canonical top-level path.
    pub key: RepoKey,
    pub root: PathBuf,
    /// Directory name, used as the project heading.
    pub name: String,
}

impl Repository {
    pub fn from_root(root: PathBuf) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self {
            key: RepoKey::from_path(&root),
            root,
            name,
        }
    }
}

/// Where committed work was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRange {
    /// `<hash>..HEAD`.
    SinceCommit(String),
    /// Commits after this instant (local midnight).
    SinceTime(DateTime<Local>),
    /// The repository has no commits.
    NoCommits,
}

/// New work found in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkBundle {
    pub repo: Repository,
    pub range: CommitRange,
    /// Labelled diff text, possibly truncated.
    pub diff: String,
    /// Newest commit reached; what gets recorded after a successful summary.
    pub head: Option<String>,
    pub truncated: bool,
}

/// Source of per-repository work.
pub trait WorkSource {
    /// Resolve a configured path to its repository.
    fn locate(&self, path: &Path) -> Result<Repository, CollectError>;

    /// Work in `repo` since `last_hash`. `Ok(None)` means nothing new.
    fn collect(
        &self,
        repo: &Repository,
        last_hash: Option<&str>,
    ) -> Result<Option<WorkBundle>, CollectError>;
}

/// [`WorkSource`] backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitCollector {
    max_diff_chars: usize,
    since: DateTime<Local>,
}

impl GitCollector {
    /// Collector whose time-based fallback starts at today's local midnight.
    pub fn new(max_diff_chars: usize) -> Self {
        Self::with_since(max_diff_chars, local_midnight(Local::now()))
    }

    pub fn with_since(max_diff_chars: usize, since: DateTime<Local>) -> Self {
        Self {
            max_diff_chars,
            since,
        }
    }

    fn committed(
        &self,
        git: Git<'_>,
        head: Option<&str>,
        last_hash: Option<&str>,
    ) -> Result<(CommitRange, String), CollectError> {
        let Some(head) = head else {
            return Ok((CommitRange::NoCommits, String::new()));
        };
        if let Some(last) = last_hash {
            if last == head {
                return Ok((CommitRange::SinceCommit(last.to_string()), String::new()));
            }
            if git.is_ancestor(last, head)? {
                let log = git.log_since_commit(last)?;
                return Ok((CommitRange::SinceCommit(last.to_string()), log));
            }
            tracing::warn!(
                last_hash = last,
                head,
                "last summarized commit is not an ancestor of HEAD; falling back to today's commits",
            );
        }
        let log = git.log_since_time(self.since)?;
        Ok((CommitRange::SinceTime(self.since), log))
    }
}

impl WorkSource for GitCollector {
    fn locate(&self, path: &Path) -> Result<Repository, CollectError> {
        if !path.exists() {
            return Err(CollectError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let dir = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let root = Git::new(&dir).toplevel()?;
        Ok(Repository::from_root(root))
    }

    fn collect(
        &self,
        repo: &Repository,
        last_hash: Option<&str>,
    ) -> Result<Option<WorkBundle>, CollectError> {
        let git = Git::new(&repo.root);
        let head = git.head()?;
        let (range, log) = self.committed(git, head.as_deref(), last_hash)?;
        let pending = git.uncommitted(head.is_some())?;

        let mut combined = String::new();
        if !log.trim().is_empty() {
            combined.push_str(COMMITTED_HEADER);
            combined.push('\n');
            combined.push_str(&log);
            combined.push_str("\n\n");
        }
        if !pending.trim().is_empty() {
            combined.push_str(UNCOMMITTED_HEADER);
            combined.push('\n');
            combined.push_str(&pending);
            combined.push('\n');
        }
        if combined.trim().is_empty() {
            tracing::debug!(repo = %repo.key, "no new work");
            return Ok(None);
        }

        let (diff, truncated) = truncate_chars(&combined, self.max_diff_chars);
        if truncated {
            tracing::info!(
                repo = %repo.key,
                limit = self.max_diff_chars,
                "diff truncated",
            );
        }
        Ok(Some(WorkBundle {
            repo: repo.clone(),
            range,
            diff,
            head,
            truncated,
        }))
    }
}

/// First `max` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// 00:00 local time on the day of `now`.
pub fn local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rstest::rstest;

    #[rstest]
    #[case::multibyte("héllo wörld", 4, "héll", true)]
    #[case::shorter("short", 100, "short", false)]
    #[case::exact("abc", 3, "abc", false)]
    #[case::zero("abc", 0, "", true)]
    fn truncation_respects_char_boundaries(
        #[case] text: &str,
        #[case] max: usize,
        #[case] expected: &str,
        #[case] truncated: bool,
    ) {
        assert_eq!(truncate_chars(text, max), (expected.to_string(), truncated));
    }

    #[test]
    fn midnight_is_start_of_day() {
        let midnight = local_midnight(Local::now());
        assert_eq!((midnight.hour(), midnight.minute(), midnight.second()), (0, 0, 0));
        assert_eq!(midnight.date_naive(), Local::now().date_naive());
    }

    #[test]
    fn repository_name_is_directory_name() {
        let repo = Repository::from_root(PathBuf::from("/home/dev/api"));
        assert_eq!(repo.name, "api");
        assert_eq!(repo.key.as_str(), "/home/dev/api");
    }
}
