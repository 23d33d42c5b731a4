//! Append-only audit log — one line per send attempt.

use duemail_core::types::LogEntry;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flat-file audit log. Write failures are reported, never propagated.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry`. Returns whether the line reached the file.
    pub fn record(&self, entry: &LogEntry) -> bool {
        match self.append(&entry.to_line()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("❌ Failed to log email to {}: {e}", self.path.display());
                false
            }
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}
