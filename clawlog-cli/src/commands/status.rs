//! `claw-log status` — what is tracked and whether a run is in progress.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use clawlog_core::{Config, LoadOutcome, LockHolder, RunLock, StateFile, StateStore};

/// Arguments for `claw-log status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let config = Config::load_at(root).context("failed to load configuration")?;
        let state = StateFile::at(root);
        let (store, note) = match state.load() {
            LoadOutcome::Missing => (StateStore::default(), None),
            LoadOutcome::Loaded(store) => (store, None),
            LoadOutcome::Corrupted { backup, .. } => (
                StateStore::default(),
                Some(match backup {
                    Some(path) => format!("state file was corrupted; moved to {}", path.display()),
                    None => "state file is corrupted and could not be moved aside".to_string(),
                }),
            ),
            LoadOutcome::Unreadable { source } => (
                StateStore::default(),
                Some(format!("state file is unreadable: {source}")),
            ),
        };
        let holder = RunLock::at(root)
            .holder()
            .context("failed to inspect run lock")?;

        let report = StatusReport {
            root: root.to_path_buf(),
            provider: config.provider.to_string(),
            model: config.model().to_string(),
            configured_projects: config.project_paths.len(),
            lock: holder.map(LockJson::from),
            projects: store
                .projects
                .iter()
                .map(|(key, record)| ProjectJson {
                    repo: key.to_string(),
                    last_commit_hash: record.last_commit_hash.clone(),
                    last_run_at: record.last_run_at,
                })
                .collect(),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        if let Some(note) = note {
            eprintln!("{} {note}", "!".yellow());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusReport {
    root: PathBuf,
    provider: String,
    model: String,
    configured_projects: usize,
    lock: Option<LockJson>,
    projects: Vec<ProjectJson>,
}

#[derive(Serialize)]
struct LockJson {
    pid: Option<u32>,
    alive: bool,
}

impl From<LockHolder> for LockJson {
    fn from(h: LockHolder) -> Self {
        Self {
            pid: h.pid,
            alive: h.alive,
        }
    }
}

#[derive(Serialize)]
struct ProjectJson {
    repo: String,
    last_commit_hash: Option<String>,
    last_run_at: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "repository")]
    repo: String,
    #[tabled(rename = "last commit")]
    commit: String,
    #[tabled(rename = "last run")]
    last_run: String,
}

fn print_table(report: &StatusReport) {
    println!(
        "claw-log v{} | {} ({}) | {} configured | {} tracked",
        env!("CARGO_PKG_VERSION"),
        report.provider,
        report.model,
        report.configured_projects,
        report.projects.len(),
    );
    println!("root: {}", report.root.display());

    match &report.lock {
        None => {}
        Some(LockJson { pid, alive: true }) => println!(
            "{} run in progress (pid {})",
            "■".yellow().bold(),
            pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into())
        ),
        Some(LockJson { .. }) => println!(
            "{} stale run lock; remove it with `claw-log unlock`",
            "■".red().bold()
        ),
    }

    if report.projects.is_empty() {
        println!("No repositories tracked yet.");
        return;
    }

    let rows: Vec<StatusTableRow> = report
        .projects
        .iter()
        .map(|p| StatusTableRow {
            repo: p.repo.clone(),
            commit: p
                .last_commit_hash
                .as_deref()
                .map(short_hash)
                .unwrap_or("-")
                .to_string(),
            last_run: p
                .last_run_at
                .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_handles_short_input() {
        assert_eq!(short_hash("3f9c1e2ab"), "3f9c1e2");
        assert_eq!(short_hash("abc"), "abc");
    }
}
