//! # clawlog-pipeline
//!
//! Orchestrates a single invocation: lock, load state, collect, summarize,
//! write the career log, record progress.
//!
//! Call [`run_at`] for the standard wiring, or [`run`] with a hand-built
//! [`RunContext`] to substitute collaborators.

pub mod error;
pub mod journal;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{combine, run, run_at, RunContext, RunOptions, RunOutcome, SkippedRepo};
