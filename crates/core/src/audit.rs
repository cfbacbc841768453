//! Append-only audit log (spec §6): one JSON object per line.
//!
//! Readers may tail this file; writers only ever append, so a reader
//! never observes a truncated record mid-write as long as each `write`
//! call below stays under the OS's atomic pipe-append guarantee for a
//! single line (true for any realistic audit line length here).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLine {
    pub ts: DateTime<Utc>,
    pub workflow_id: String,
    pub phase: String,
    pub action: String,
    pub status: String,
    pub detail: Value,
}

/// Appends [`AuditLine`] records to a single JSONL file.
pub struct AuditLog {
    path: std::path::PathBuf,
}

impl AuditLog {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record, creating the file and its parent directory if needed.
    pub fn record(&self, line: &AuditLine) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut serialized = serde_json::to_string(line).map_err(std::io::Error::other)?;
        serialized.push('\n');
        file.write_all(serialized.as_bytes())?;
        file.flush()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `bytes` to `path` via a same-directory temp file and rename, so
/// readers never observe a partially written file (spec §8.4).
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string()),
        uuid::Uuid::new_v4()
    ));
    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_appends_one_json_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        for i in 0..3 {
            log.record(&AuditLine {
                ts: Utc::now(),
                workflow_id: "wf-1".into(),
                phase: "Scan".into(),
                action: "invoke".into(),
                status: "ok".into(),
                detail: json!({ "i": i }),
            })
            .unwrap();
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 3);
        for line in contents.lines() {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["workflow_id"], "wf-1");
        }
    }

    #[test]
    fn atomic_write_never_leaves_a_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scan_latest.json");
        atomic_write(&target, b"{\"scanner\":\"bandit\"}").unwrap();

        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "{\"scanner\":\"bandit\"}"
        );
        let leftover: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftover.is_empty());
    }
}
