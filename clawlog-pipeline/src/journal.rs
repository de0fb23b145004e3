//! The career log: a Markdown file with the newest entry on top.
//!
//! ```text
//! ## 📅 2024-05-02
//!
//! <summary>
//!
//! ---
//!
//! ## 📅 2024-05-01
//! ...
//! ```

use std::io;
use std::path::Path;

use chrono::NaiveDate;

use clawlog_core::atomic;

use crate::error::{journal_err, PipelineError};

/// Render one dated entry, including its trailing separator.
pub fn entry(date: NaiveDate, summary: &str) -> String {
    format!(
        "## 📅 {}\n\n{}\n\n---\n\n",
        date.format("%Y-%m-%d"),
        summary.trim()
    )
}

/// Put a new entry at the top of `path`, keeping everything already there.
///
/// A log that exists but cannot be read (permissions, invalid UTF-8) is an
/// error: rewriting it would lose history.
pub fn prepend_entry(path: &Path, date: NaiveDate, summary: &str) -> Result<(), PipelineError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(journal_err(path, e)),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| journal_err(parent, e))?;
    }

    let mut contents = entry(date, summary);
    contents.push_str(&existing);
    atomic::write_atomic(path, contents.as_bytes()).map_err(|e| journal_err(path, e))?;

    tracing::info!(path = %path.display(), "career log updated");
    Ok(())
}
