//! `claw-log unlock` — clear a lock whose owner died without cleaning up.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use clawlog_core::RunLock;

/// Arguments for `claw-log unlock`.
#[derive(Args, Debug)]
pub struct UnlockArgs {}

impl UnlockArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let lock = RunLock::at(root);
        match lock.clear_stale().context("refusing to unlock")? {
            Some(holder) => println!(
                "{} removed stale lock {}{}",
                "✓".green(),
                lock.path().display(),
                holder
                    .pid
                    .map(|pid| format!(" (pid {pid})"))
                    .unwrap_or_default()
            ),
            None => println!("No run lock present."),
        }
        Ok(())
    }
}
