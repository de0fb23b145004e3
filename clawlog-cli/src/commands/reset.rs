//! `claw-log reset` — forget progress so work is summarized again.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use clawlog_collect::{GitCollector, WorkSource};
use clawlog_core::{Acquisition, RepoKey, RunLock, StateFile};

/// Arguments for `claw-log reset`.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Repository to forget (repeatable). Without it the whole state file is
    /// moved aside as a backup.
    #[arg(long, value_name = "PATH")]
    pub repo: Vec<PathBuf>,

    /// Confirm the reset.
    #[arg(long)]
    pub yes: bool,
}

impl ResetArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        if !self.yes {
            bail!("reset discards recorded progress; re-run with --yes to confirm");
        }

        let guard = match RunLock::at(root)
            .acquire()
            .context("failed to take run lock")?
        {
            Acquisition::Acquired(guard) => guard,
            contended => bail!(
                "{}",
                contended
                    .message()
                    .unwrap_or_else(|| "claw-log is already running".to_string())
            ),
        };

        let state = StateFile::at(root);
        if self.repo.is_empty() {
            match state.reset().context("failed to reset state")? {
                Some(backup) => println!(
                    "{} state reset; previous file kept at {}",
                    "✓".green(),
                    backup.display()
                ),
                None => println!("Nothing to reset."),
            }
        } else {
            let keys: Vec<RepoKey> = self.repo.iter().map(|p| repo_key(p)).collect();
            let removed = state.forget(&keys).context("failed to update state")?;
            for key in &keys {
                if removed.contains(key) {
                    println!("{} forgot {key}", "✓".green());
                } else {
                    println!("{} not tracked: {key}", "-".bright_black());
                }
            }
        }

        guard.release().context("failed to release run lock")?;
        Ok(())
    }
}

/// Key the pipeline would have used for `path`: the repository top level
/// when it is still a repository, else the path as given.
fn repo_key(path: &Path) -> RepoKey {
    match GitCollector::new(0).locate(path) {
        Ok(repo) => repo.key,
        Err(_) => RepoKey::from_path(&path.canonicalize().unwrap_or_else(|_| path.to_path_buf())),
    }
}
