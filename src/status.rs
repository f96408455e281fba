//! Append-only scan status log.
//!
//! One JSON record per line. A scan id accumulates `IN_PROGRESS` pulses
//! while healthy, then exactly one terminal record. Consumers tail or
//! re-read the file; delivery is best effort, appends are never retried,
//! and no cross-process locking is performed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

/// Lifecycle states recorded in the status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    InProgress,
    Complete,
    Cancelled,
    Error,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanStatus::InProgress => "IN_PROGRESS",
            ScanStatus::Complete => "COMPLETE",
            ScanStatus::Cancelled => "CANCELLED",
            ScanStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One line of the status log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub scan_id: String,
    pub scan_status: ScanStatus,
    pub scan_message: String,
}

impl StatusRecord {
    /// Build a record. Embedded newlines in the message are flattened to
    /// spaces so the one-record-per-line framing survives.
    pub fn new(
        scan_id: impl Into<String>,
        scan_status: ScanStatus,
        scan_message: impl Into<String>,
    ) -> Self {
        Self {
            scan_id: scan_id.into(),
            scan_status,
            scan_message: scan_message.into().replace(['\n', '\r'], " "),
        }
    }
}

/// Errors from status log operations.
#[derive(Debug)]
pub enum StatusError {
    Serialize {
        source: serde_json::Error,
    },
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Serialize { source } => {
                write!(f, "failed to serialize status record: {source}")
            }
            StatusError::CreateDir { path, source } => {
                write!(f, "failed to create log directory {}: {source}", path.display())
            }
            StatusError::Append { path, source } => {
                write!(f, "failed to append to status log {}: {source}", path.display())
            }
            StatusError::Read { path, source } => {
                write!(f, "failed to read status log {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Serialize { source } => Some(source),
            StatusError::CreateDir { source, .. } => Some(source),
            StatusError::Append { source, .. } => Some(source),
            StatusError::Read { source, .. } => Some(source),
        }
    }
}

/// Appends status records to a single log file.
#[derive(Debug, Clone)]
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    /// Create a writer for the given log path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writer for the log at its standard installation-root location.
    pub fn from_env() -> Self {
        Self::new(crate::data_dir::InstallDir::from_env().scan_status_log())
    }

    /// Path to the status log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    ///
    /// Creates missing parent directories (owner/group only), opens the file
    /// in append mode without ever truncating it, and writes the whole line
    /// in one call so interleaved appends from independent jobs keep their
    /// framing. The handle closes on every exit path.
    pub fn append(&self, record: &StatusRecord) -> Result<(), StatusError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StatusError::Serialize { source: e })?;
        line.push('\n');

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::DirBuilder::new()
                    .recursive(true)
                    .mode(0o750)
                    .create(dir)
                    .map_err(|e| StatusError::CreateDir {
                        path: dir.to_path_buf(),
                        source: e,
                    })?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(|e| StatusError::Append {
                path: self.path.clone(),
                source: e,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| StatusError::Append {
                path: self.path.clone(),
                source: e,
            })
    }
}

/// Read every parseable record from a status log.
///
/// Malformed lines are skipped rather than failing the whole read; a log
/// with interleaved writers or a torn final line must still be usable.
pub fn read_log(path: &Path) -> Result<Vec<StatusRecord>, StatusError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StatusError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut records = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<StatusRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::debug!(error = %e, "skipping malformed status line"),
        }
    }
    Ok(records)
}

/// Latest record per scan id, in the order each id first appeared.
pub fn latest_by_scan(records: &[StatusRecord]) -> Vec<StatusRecord> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &StatusRecord> = HashMap::new();
    for record in records {
        if !latest.contains_key(record.scan_id.as_str()) {
            order.push(&record.scan_id);
        }
        latest.insert(&record.scan_id, record);
    }
    order
        .into_iter()
        .filter_map(|id| latest.get(id).map(|r| (*r).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_append_writes_one_json_line_per_record() {
        let dir = tempdir().unwrap();
        let log = StatusLog::new(dir.path().join("scan_status.log"));

        log.append(&StatusRecord::new("scan-1", ScanStatus::InProgress, ""))
            .unwrap();
        log.append(&StatusRecord::new("scan-1", ScanStatus::Complete, ""))
            .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["scan_id"], "scan-1");
        assert_eq!(first["scan_status"], "IN_PROGRESS");
        assert_eq!(first["scan_message"], "");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["scan_status"], "COMPLETE");
    }

    #[test]
    fn test_append_never_truncates_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan_status.log");
        std::fs::write(&path, "{\"scan_id\":\"old\",\"scan_status\":\"COMPLETE\",\"scan_message\":\"\"}\n")
            .unwrap();

        let log = StatusLog::new(&path);
        log.append(&StatusRecord::new("new", ScanStatus::InProgress, ""))
            .unwrap();

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].scan_id, "old");
        assert_eq!(records[1].scan_id, "new");
    }

    #[test]
    fn test_append_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("var/log/scanward/scan_status.log");
        let log = StatusLog::new(&path);

        log.append(&StatusRecord::new("s", ScanStatus::InProgress, ""))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_created_paths_have_restricted_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/scan_status.log");
        let log = StatusLog::new(&path);
        log.append(&StatusRecord::new("s", ScanStatus::InProgress, ""))
            .unwrap();

        // The umask can only remove bits, so assert the absent ones.
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o007, 0, "log dir should not be world-accessible");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o077, 0, "log file should be owner-only");
    }

    #[test]
    fn test_message_newlines_are_flattened() {
        let record = StatusRecord::new("s", ScanStatus::Error, "line one\nline two\r\nthree");
        assert_eq!(record.scan_message, "line one line two  three");

        let dir = tempdir().unwrap();
        let log = StatusLog::new(dir.path().join("scan_status.log"));
        log.append(&record).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_append_failure_is_reported_not_swallowed() {
        let log = StatusLog::new("/proc/does-not-exist/scan_status.log");
        let err = log
            .append(&StatusRecord::new("s", ScanStatus::InProgress, ""))
            .unwrap_err();
        assert!(matches!(
            err,
            StatusError::CreateDir { .. } | StatusError::Append { .. }
        ));
    }

    #[test]
    fn test_read_log_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan_status.log");
        let log = StatusLog::new(&path);
        log.append(&StatusRecord::new("a", ScanStatus::InProgress, ""))
            .unwrap();

        // Simulate a torn write from a crashed producer.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"scan_id\":\"b\",\"scan_st\n").unwrap();
        drop(file);

        log.append(&StatusRecord::new("a", ScanStatus::Complete, ""))
            .unwrap();

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].scan_status, ScanStatus::Complete);
    }

    #[test]
    fn test_read_log_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = read_log(&dir.path().join("nope.log")).unwrap_err();
        assert!(matches!(err, StatusError::Read { .. }));
        assert!(err.to_string().contains("failed to read status log"));
    }

    #[test]
    fn test_latest_by_scan_keeps_last_record_per_id() {
        let records = vec![
            StatusRecord::new("a", ScanStatus::InProgress, ""),
            StatusRecord::new("b", ScanStatus::InProgress, ""),
            StatusRecord::new("a", ScanStatus::Complete, ""),
            StatusRecord::new("b", ScanStatus::Error, "boom"),
        ];
        let latest = latest_by_scan(&records);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].scan_id, "a");
        assert_eq!(latest[0].scan_status, ScanStatus::Complete);
        assert_eq!(latest[1].scan_id, "b");
        assert_eq!(latest[1].scan_message, "boom");
    }

    #[test]
    fn test_status_wire_names() {
        for (status, expected) in [
            (ScanStatus::InProgress, "IN_PROGRESS"),
            (ScanStatus::Complete, "COMPLETE"),
            (ScanStatus::Cancelled, "CANCELLED"),
            (ScanStatus::Error, "ERROR"),
        ] {
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{expected}\"")
            );
            assert_eq!(status.to_string(), expected);
        }
    }

    #[test]
    fn test_interleaved_appends_from_two_jobs_stay_framed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan_status.log");
        let a = StatusLog::new(&path);
        let b = StatusLog::new(&path);

        a.append(&StatusRecord::new("a", ScanStatus::InProgress, ""))
            .unwrap();
        b.append(&StatusRecord::new("b", ScanStatus::InProgress, ""))
            .unwrap();
        a.append(&StatusRecord::new("a", ScanStatus::Complete, ""))
            .unwrap();
        b.append(&StatusRecord::new("b", ScanStatus::Cancelled, "Scan stopped by user"))
            .unwrap();

        let latest = latest_by_scan(&read_log(&path).unwrap());
        assert_eq!(latest[0].scan_status, ScanStatus::Complete);
        assert_eq!(latest[1].scan_status, ScanStatus::Cancelled);
    }
}
