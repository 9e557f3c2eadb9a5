//! Append-only audit file of update errors.
//!
//! One line per error: `timestamp | message | detail`. The file is opened in
//! append mode for each entry and never rewritten.

use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Audit file name inside the data directory.
pub const AUDIT_LOG_FILE: &str = "autopatch_errors.log";

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

    /// Append one entry. Failures are logged, never propagated.
    pub fn record(&self, message: &str, detail: &str) {
        if let Err(e) = self.append(message, detail) {
            tracing::warn!(
                target: "autopatch::update",
                "Could not write audit entry to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn append(&self, message: &str, detail: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = format!(
            "{} | {} | {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            single_line(message),
            single_line(detail)
        );
        file.write_all(line.as_bytes())
    }

    /// All entries, oldest first. Missing file means no entries.
    pub fn entries(&self) -> Vec<String> {
        std::fs::read_to_string(&self.path)
            .map(|contents| contents.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

// Entries are line-oriented.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_lines() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(temp.path().join(AUDIT_LOG_FILE));

        log.record("Download failed", "connection reset");
        log.record("Rollback failed", "installer exited with status 1");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        let fields: Vec<&str> = entries[0].split(" | ").collect();
        assert_eq!(fields.len(), 3);
        assert!(chrono::DateTime::parse_from_rfc3339(fields[0]).is_ok());
        assert_eq!(fields[1], "Download failed");
        assert_eq!(fields[2], "connection reset");
        assert!(entries[1].contains("Rollback failed"));
    }

    #[test]
    fn test_multiline_detail_is_flattened() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(temp.path().join(AUDIT_LOG_FILE));

        log.record("Install failed", "line one\nline two");

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("line one line two"));
    }

    #[test]
    fn test_entries_without_file() {
        let temp = TempDir::new().unwrap();
        assert!(AuditLog::new(temp.path().join(AUDIT_LOG_FILE)).entries().is_empty());
    }
}
