//! Per-container log files.

use std::io::Write;
use std::path::{Path, PathBuf};

use convoy_common::error::{ConvoyError, Result};

/// Returns the log file path for a container.
#[must_use]
pub fn log_path(data_dir: &Path, container_id: &str) -> PathBuf {
    data_dir.join("logs").join(format!("{container_id}.log"))
}

/// Opens a container's log file for appending, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn open_log(data_dir: &Path, container_id: &str) -> Result<std::fs::File> {
    let path = log_path(data_dir, container_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConvoyError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ConvoyError::Io { path, source: e })
}

/// Reads container logs from disk.
///
/// Returns an empty string if the log file does not exist yet.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(data_dir: &Path, container_id: &str) -> Result<String> {
    let path = log_path(data_dir, container_id);
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(&path).map_err(|e| ConvoyError::Io { path, source: e })
}

/// Appends a line to a container's log.
///
/// # Errors
///
/// Returns an error if the log cannot be opened or written.
pub fn append_log(data_dir: &Path, container_id: &str, line: &str) -> Result<()> {
    let mut file = open_log(data_dir, container_id)?;
    writeln!(file, "{line}").map_err(|e| ConvoyError::Io {
        path: log_path(data_dir, container_id),
        source: e,
    })
}

/// Deletes a container's log file if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove_log(data_dir: &Path, container_id: &str) -> Result<()> {
    let path = log_path(data_dir, container_id);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConvoyError::Io { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let p = log_path(Path::new("/var/lib/convoy"), "abc-123");
        assert_eq!(p.to_str().unwrap(), "/var/lib/convoy/logs/abc-123.log");
    }

    #[test]
    fn read_logs_missing_file_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_logs(dir.path(), "nonexistent").expect("should succeed");
        assert!(content.is_empty());
    }

    #[test]
    fn separate_containers_have_separate_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_log(dir.path(), "a", "from a").expect("append a");
        append_log(dir.path(), "b", "from b").expect("append b");
        append_log(dir.path(), "a", "again").expect("append a");

        let a_logs = read_logs(dir.path(), "a").expect("read a");
        assert_eq!(a_logs, "from a\nagain\n");
        assert!(!read_logs(dir.path(), "b").expect("read b").contains("from a"));
    }

    #[test]
    fn remove_log_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_log(dir.path(), "c", "line").expect("append");
        remove_log(dir.path(), "c").expect("remove");
        remove_log(dir.path(), "c").expect("remove again");
        assert!(!log_path(dir.path(), "c").exists());
    }
}
