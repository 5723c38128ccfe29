//! Append-only audit log of classified actions.

use aegis_core::{ActionResult, StorageError, Timestamp};
use chrono::SecondsFormat;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One line per classified action:
/// `[<RFC3339>] Action: <kind> | Payload: <payload>`.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<()>,
}

/// Render an audit line (without the trailing newline).
pub fn format_entry(at: Timestamp, result: &ActionResult) -> String {
    format!(
        "[{}] Action: {} | Payload: {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        result.kind,
        result.payload
    )
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry for `result`.
    pub fn append(&self, result: &ActionResult) -> Result<(), StorageError> {
        self.append_at(chrono::Utc::now(), result)
    }

    pub fn append_at(&self, at: Timestamp, result: &ActionResult) -> Result<(), StorageError> {
        let mut line = format_entry(at, result);
        line.push('\n');

        let _writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error(e))
    }

    /// Append, logging instead of failing.
    pub fn record(&self, result: &ActionResult) {
        if let Err(e) = self.append(result) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }

    fn io_error(&self, e: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_entry() {
        let at = chrono::Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        let line = format_entry(at, &ActionResult::fix("kubectl rollout restart deploy/api", 0.9));
        assert_eq!(
            line,
            "[2025-02-03T04:05:06Z] Action: FIX | Payload: kubectl rollout restart deploy/api"
        );
    }

    #[test]
    fn test_append_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("data/audit.log"));
        log.append(&ActionResult::query("up", 0.5)).unwrap();
        log.append(&ActionResult::explain("all good", 0.5)).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Action: QUERY | Payload: up"));
        assert!(lines[1].ends_with("Action: EXPLAIN | Payload: all good"));
    }

    #[test]
    fn test_record_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for append.
        let log = AuditLog::new(dir.path());
        assert!(log.append(&ActionResult::query("up", 0.5)).is_err());
        log.record(&ActionResult::query("up", 0.5));
    }
}
