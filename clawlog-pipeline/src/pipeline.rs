//! One `claw-log run`, start to finish.
//!
//! 1. Take the run lock. Another live run means we stop here, touching
//!    nothing.
//! 2. Load the state file (corruption is quarantined and logged).
//! 3. Collect new work from every configured path; a path that fails is
//!    logged and skipped.
//! 4. Nothing new → done. `--dry-run` → return the activity text.
//! 5. Summarize. A backend failure aborts with state unchanged.
//! 6. Prepend the career log, then record each repository's newest commit.
//!
//! The lock is released on every exit path by its guard.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use clawlog_collect::{GitCollector, WorkBundle, WorkSource};
use clawlog_core::state::get_last_hash;
use clawlog_core::{
    Acquisition, Config, ConfigError, OsProcessProbe, PendingUpdates, ProcessLivenessChecker,
    RepoKey, RunLock, StateFile,
};
use clawlog_engine::{build_summarizer, Summarizer};

use crate::error::PipelineError;
use crate::journal;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Collect and report, but call no backend and write nothing.
    pub dry_run: bool,
}

/// Collaborators and locations for a run.
pub struct RunContext<'a, C = OsProcessProbe> {
    pub lock: RunLock<C>,
    pub state: StateFile,
    pub source: &'a dyn WorkSource,
    pub project_paths: &'a [PathBuf],
    pub log_file: PathBuf,
    /// Date written in the journal heading.
    pub today: NaiveDate,
}

impl<'a> RunContext<'a> {
    /// Standard locations under `root`; the log file resolves against `cwd`.
    pub fn at(root: &Path, config: &'a Config, source: &'a dyn WorkSource, cwd: &Path) -> Self {
        Self {
            lock: RunLock::at(root),
            state: StateFile::at(root),
            source,
            project_paths: &config.project_paths,
            log_file: config.log_file_in(cwd),
            today: Local::now().date_naive(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A configured path that produced no work because it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepo {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another live run holds the lock.
    AlreadyRunning { message: String },
    /// No repository had anything new.
    NoChanges { skipped: Vec<SkippedRepo> },
    /// `--dry-run`: what would have been sent to the backend.
    DryRun {
        activity: String,
        repos: Vec<RepoKey>,
        skipped: Vec<SkippedRepo>,
    },
    Completed {
        log_file: PathBuf,
        summary: String,
        /// Repositories whose last processed commit was advanced.
        recorded: Vec<RepoKey>,
        skipped: Vec<SkippedRepo>,
    },
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run with the git collector and the configured backend.
pub fn run_at(
    root: &Path,
    config: &Config,
    cwd: &Path,
    options: RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let collector = GitCollector::new(config.max_diff_chars);
    let ctx = RunContext::at(root, config, &collector, cwd);
    run(&ctx, options, || build_summarizer(config))
}

/// Execute one run. `summarizer` is only called once there is work to
/// summarize and `dry_run` is off, so a missing API key does not stop a
/// dry run or a quiet day.
pub fn run<C, F>(
    ctx: &RunContext<'_, C>,
    options: RunOptions,
    summarizer: F,
) -> Result<RunOutcome, PipelineError>
where
    C: ProcessLivenessChecker,
    F: FnOnce() -> Result<Box<dyn Summarizer>, ConfigError>,
{
    let guard = match ctx.lock.acquire()? {
        Acquisition::Acquired(guard) => guard,
        contended @ Acquisition::AlreadyRunning { .. } => {
            let message = contended.message().unwrap_or_default();
            tracing::warn!("{message}");
            return Ok(RunOutcome::AlreadyRunning { message });
        }
    };

    let outcome = run_locked(ctx, options, summarizer)?;

    if let Err(e) = guard.release() {
        tracing::warn!(error = %e, "could not remove run lock");
    }
    Ok(outcome)
}

fn run_locked<C, F>(
    ctx: &RunContext<'_, C>,
    options: RunOptions,
    summarizer: F,
) -> Result<RunOutcome, PipelineError>
where
    F: FnOnce() -> Result<Box<dyn Summarizer>, ConfigError>,
{
    // Corrupt or unreadable state is logged by `load` and treated as empty.
    let store = ctx.state.load().into_store();

    let (bundles, skipped) = collect_all(ctx.source, ctx.project_paths, |key| {
        get_last_hash(&store, key)
    });

    if bundles.is_empty() {
        tracing::info!(skipped = skipped.len(), "no new work");
        return Ok(RunOutcome::NoChanges { skipped });
    }

    let activity = combine(&bundles);
    let repos: Vec<RepoKey> = bundles.iter().map(|b| b.repo.key.clone()).collect();

    if options.dry_run {
        return Ok(RunOutcome::DryRun {
            activity,
            repos,
            skipped,
        });
    }

    let backend = summarizer()?;
    tracing::info!(provider = backend.provider(), repos = repos.len(), "summarizing");
    let summary = backend.summarize(&activity)?;

    journal::prepend_entry(&ctx.log_file, ctx.today, &summary)?;

    let pending: PendingUpdates = bundles
        .iter()
        .filter_map(|b| b.head.clone().map(|head| (b.repo.key.clone(), head)))
        .collect();
    ctx.state.save(&pending)?;

    Ok(RunOutcome::Completed {
        log_file: ctx.log_file.clone(),
        summary,
        recorded: pending.into_keys().collect(),
        skipped,
    })
}

/// Locate and collect every configured path. Paths resolving to the same
/// repository are collected once.
fn collect_all<L>(
    source: &dyn WorkSource,
    paths: &[PathBuf],
    last_hash: L,
) -> (Vec<WorkBundle>, Vec<SkippedRepo>)
where
    L: Fn(&RepoKey) -> Option<String>,
{
    let mut bundles = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = BTreeSet::new();

    for path in paths {
        let repo = match source.locate(path) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping project");
                skipped.push(SkippedRepo {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !seen.insert(repo.key.clone()) {
            tracing::debug!(repo = %repo.key, "already collected");
            continue;
        }

        let last = last_hash(&repo.key);
        match source.collect(&repo, last.as_deref()) {
            Ok(Some(bundle)) => {
                tracing::info!(repo = %repo.key, bytes = bundle.diff.len(), "collected");
                bundles.push(bundle);
            }
            Ok(None) => tracing::info!(repo = %repo.key, "nothing new"),
            Err(e) => {
                tracing::warn!(repo = %repo.key, error = %e, "skipping project");
                skipped.push(SkippedRepo {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (bundles, skipped)
}

/// Activity text sent to the backend: one labelled block per repository.
pub fn combine(bundles: &[WorkBundle]) -> String {
    bundles
        .iter()
        .map(|b| format!("\n--- PROJECT: {} ---\n{}\n", b.repo.name, b.diff))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawlog_collect::{CommitRange, Repository};

    fn bundle(name: &str, diff: &str) -> WorkBundle {
        WorkBundle {
            repo: Repository::from_root(PathBuf::from(format!("/code/{name}"))),
            range: CommitRange::NoCommits,
            diff: diff.to_string(),
            head: None,
            truncated: false,
        }
    }

    #[test]
    fn combine_labels_each_project() {
        let text = combine(&[bundle("api", "diff a"), bundle("web", "diff b")]);
        assert_eq!(
            text,
            "\n--- PROJECT: api ---\ndiff a\n\n--- PROJECT: web ---\ndiff b\n"
        );
    }

    #[test]
    fn combine_of_nothing_is_empty() {
        assert!(combine(&[]).is_empty());
    }
}
