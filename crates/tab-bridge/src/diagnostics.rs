//! Durable error log for fatal transport failures.
//!
//! stdout carries protocol frames and stderr may not be captured by the
//! browser, so fatal errors are also appended to a plain-text file. The
//! bridge never reads this file back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only plain-text error sink.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Newlines inside `message` are flattened so each
    /// failure stays on a single line.
    pub fn append(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = message.replace(['\r', '\n'], " ");
        writeln!(
            file,
            "{} {}",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            line
        )
    }

    /// Append, logging instead of failing if the file is unwritable.
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!(path = ?self.path, error = %e, "Could not write error log");
        }
    }
}
