//! claw-log — turn the day's git work into a career log entry.
//!
//! # Usage
//!
//! ```text
//! claw-log [run] [--dry-run]
//! claw-log status [--json]
//! claw-log reset [--repo <path>]... --yes
//! claw-log unlock
//! ```
//!
//! Every subcommand accepts `--root <dir>` (default `~/.claw-log`, env
//! `CLAW_LOG_HOME`) and `-v`/`-vv` for more log output on stderr.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{reset::ResetArgs, run::RunArgs, status::StatusArgs, unlock::UnlockArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "claw-log",
    version,
    about = "Summarize the day's git work into a career log",
    long_about = None,
)]
struct Cli {
    /// Storage directory for state, lock, and config.
    #[arg(long, global = true, env = "CLAW_LOG_HOME", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect new work, summarize it, and prepend the career log (default).
    Run(RunArgs),

    /// Show tracked repositories and lock state.
    Status(StatusArgs),

    /// Forget tracked repositories, or set the whole state file aside.
    Reset(ResetArgs),

    /// Remove a run lock left behind by a dead process.
    Unlock(UnlockArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = clawlog_core::paths::resolve_root(cli.root)?;
    tracing::debug!(root = %root.display(), "storage root");
    dispatch(cli.command, &root)
}

fn dispatch(command: Option<Commands>, root: &Path) -> Result<()> {
    match command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => args.run(root),
        Commands::Status(args) => args.run(root),
        Commands::Reset(args) => args.run(root),
        Commands::Unlock(args) => args.run(root),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
