//! `claw-log run` — the daily job.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use clawlog_core::{paths, Config};
use clawlog_pipeline::{run_at, RunOptions, RunOutcome, SkippedRepo};

/// Arguments for `claw-log run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Print the collected activity instead of summarizing it. Writes nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let config = Config::load_at(root).context("failed to load configuration")?;
        if config.project_paths.is_empty() {
            bail!(
                "no projects configured; add `project_paths` to {} or set CLAW_LOG_PROJECT_PATHS",
                paths::config_path(root).display()
            );
        }
        let cwd = std::env::current_dir().context("could not determine working directory")?;

        let outcome = run_at(
            root,
            &config,
            &cwd,
            RunOptions {
                dry_run: self.dry_run,
            },
        )
        .context("claw-log run failed")?;

        match outcome {
            RunOutcome::AlreadyRunning { message } => {
                println!("{}", message.yellow());
            }
            RunOutcome::NoChanges { skipped } => {
                print_skipped(&skipped);
                println!("No new work since the last run.");
            }
            RunOutcome::DryRun {
                activity,
                repos,
                skipped,
            } => {
                print_skipped(&skipped);
                println!("[dry-run] new work in {} repositories:", repos.len());
                for repo in &repos {
                    println!("  {repo}");
                }
                println!("{activity}");
            }
            RunOutcome::Completed {
                log_file,
                summary,
                recorded,
                skipped,
            } => {
                print_skipped(&skipped);
                println!("{summary}");
                println!();
                println!(
                    "{} career log updated: {} ({} repositories recorded)",
                    "✓".green(),
                    log_file.display(),
                    recorded.len()
                );
            }
        }
        Ok(())
    }
}

fn print_skipped(skipped: &[SkippedRepo]) {
    for s in skipped {
        eprintln!("{} skipped {}: {}", "!".yellow(), s.path.display(), s.reason);
    }
}
