//! Scoped acquisition of a file set with guaranteed restore on failure
//! (spec §4.3).
//!
//! `with_file_lease` is the only way the rest of the kernel is allowed to
//! touch a target file: it snapshots every path up front, hands the
//! caller a [`LeaseWriter`] that stages writes through a same-directory
//! temp file + rename, and on any error restores every touched path from
//! the snapshot before returning. Restore failure is fatal and is never
//! folded into a generic I/O error -- it is the one error the orchestrator
//! must abort the whole workflow on (spec §7).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A backup could not be restored to its original content hash
    /// (spec §4.3, §7 `RestoreFailed`).
    #[error("unrecoverable restore failure for {path}, backup at {backup_ref}")]
    UnrecoverableRestoreFailure { path: String, backup_ref: String },
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content + permission snapshot of one file, plus the hash needed to
/// verify a later restore (spec §8.3: bit-exact restore).
struct Snapshot {
    original_bytes: Vec<u8>,
    original_hash: String,
    permissions: fs::Permissions,
    existed: bool,
    backup_path: PathBuf,
}

/// Directory `backups_path/{workflow_id}/<sha256_of_path>.bak` plus a
/// `manifest.json` (spec §6 persisted-artifact table).
pub struct BackupDir {
    root: PathBuf,
}

impl BackupDir {
    #[must_use]
    pub fn new(backups_path: &Path, workflow_id: &str) -> Self {
        Self {
            root: backups_path.join(workflow_id),
        }
    }

    fn backup_path_for(&self, target: &Path) -> PathBuf {
        let key = sha256_hex(target.to_string_lossy().as_bytes());
        self.root.join(format!("{key}.bak"))
    }
}

/// A writer scoped to one [`with_file_lease`] call.
///
/// Writes go to a temp file in the target's directory and are only
/// renamed into place on [`LeaseWriter::commit`]; if the closure never
/// commits a path, that path is left untouched (and restored if the
/// closure returns an error for any other path in the batch is not
/// applicable -- each path is independent, `commit` is per-path).
pub struct LeaseWriter<'a> {
    backups: &'a BackupDir,
    touched: &'a mut Vec<PathBuf>,
}

impl LeaseWriter<'_> {
    /// Write `contents` to `path` atomically (temp file + rename).
    pub fn write(&mut self, path: &Path, contents: &[u8]) -> Result<(), LeaseError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.{}.tmp",
            path.file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "lease".to_string()),
            uuid::Uuid::new_v4()
        ));
        {
            let mut tmp = fs::File::create(&tmp_path).map_err(|e| io_err(path, e))?;
            tmp.write_all(contents).map_err(|e| io_err(path, e))?;
            tmp.sync_all().map_err(|e| io_err(path, e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
        if !self.touched.iter().any(|p| p == path) {
            self.touched.push(path.to_path_buf());
        }
        Ok(())
    }

    #[must_use]
    pub fn backup_ref(&self, path: &Path) -> String {
        self.backups.backup_path_for(path).to_string_lossy().into_owned()
    }
}

fn io_err(path: &Path, source: std::io::Error) -> LeaseError {
    LeaseError::Io {
        path: path.to_string_lossy().into_owned(),
        source,
    }
}

fn snapshot_one(path: &Path, backup_path: &Path) -> Result<Snapshot, LeaseError> {
    if let Some(parent) = backup_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
    }

    if !path.exists() {
        fs::write(backup_path, []).map_err(|e| io_err(path, e))?;
        return Ok(Snapshot {
            original_bytes: Vec::new(),
            original_hash: sha256_hex(&[]),
            permissions: fs::Permissions::from_mode(0o644),
            existed: false,
            backup_path: backup_path.to_path_buf(),
        });
    }

    let original_bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    let metadata = fs::metadata(path).map_err(|e| io_err(path, e))?;
    let permissions = metadata.permissions();
    fs::write(backup_path, &original_bytes).map_err(|e| io_err(path, e))?;

    Ok(Snapshot {
        original_hash: sha256_hex(&original_bytes),
        original_bytes,
        permissions,
        existed: true,
        backup_path: backup_path.to_path_buf(),
    })
}

fn restore_one(path: &Path, snapshot: &Snapshot) -> Result<(), LeaseError> {
    if !snapshot.existed {
        if path.exists() {
            fs::remove_file(path).map_err(|e| io_err(path, e))?;
        }
        return Ok(());
    }

    let tmp_path = path.with_extension("restore.tmp");
    fs::write(&tmp_path, &snapshot.original_bytes).map_err(|e| io_err(path, e))?;
    fs::set_permissions(&tmp_path, snapshot.permissions.clone()).map_err(|e| io_err(path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;

    let restored = fs::read(path).map_err(|e| io_err(path, e))?;
    if sha256_hex(&restored) != snapshot.original_hash {
        error!(
            path = %path.display(),
            backup = %snapshot.backup_path.display(),
            "restore did not reach original content hash"
        );
        return Err(LeaseError::UnrecoverableRestoreFailure {
            path: path.to_string_lossy().into_owned(),
            backup_ref: snapshot.backup_path.to_string_lossy().into_owned(),
        });
    }
    Ok(())
}

/// Snapshot every path in `paths`, run `f` with a [`LeaseWriter`], and on
/// any error from `f` restore every snapshotted path from backup before
/// propagating. On success, snapshots are left on disk (they are the
/// `backup_ref` surfaced on each `FixAttempt`) and `f`'s `Ok` value is
/// returned.
///
/// Hash verification after restore is mandatory (spec §4.3): if a
/// restore cannot reach the original hash this function returns
/// [`LeaseError::UnrecoverableRestoreFailure`] instead of the original
/// error from `f`, since an unrestored file is the more urgent problem.
pub fn with_file_lease<T, E, F>(
    backups: &BackupDir,
    paths: &[PathBuf],
    f: F,
) -> Result<T, LeaseError>
where
    F: FnOnce(&mut LeaseWriter<'_>) -> Result<T, E>,
    E: Into<LeaseError>,
{
    let mut snapshots: HashMap<PathBuf, Snapshot> = HashMap::new();
    for path in paths {
        let backup_path = backups.backup_path_for(path);
        let snapshot = snapshot_one(path, &backup_path)?;
        snapshots.insert(path.clone(), snapshot);
    }

    let mut touched = Vec::new();
    let mut writer = LeaseWriter {
        backups,
        touched: &mut touched,
    };

    match f(&mut writer) {
        Ok(value) => Ok(value),
        Err(err) => {
            for path in paths {
                let Some(snapshot) = snapshots.get(path) else {
                    continue;
                };
                if let Err(restore_err) = restore_one(path, snapshot) {
                    warn!(path = %path.display(), "rollback after failed lease also failed to restore");
                    return Err(restore_err);
                }
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BoomError;
    impl From<BoomError> for LeaseError {
        fn from(_: BoomError) -> Self {
            LeaseError::Io {
                path: "boom".into(),
                source: std::io::Error::other("boom"),
            }
        }
    }

    #[test]
    fn rollback_restores_bit_exact_content_and_permissions_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backups_root = dir.path().join("backups");
        let target = dir.path().join("app").join("config.py");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"API_KEY = 1\n").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        let backups = BackupDir::new(&backups_root, "wf-1");
        let result: Result<(), LeaseError> = with_file_lease(&backups, &[target.clone()], |writer| {
            writer.write(&target, b"API_KEY = 2\n").map_err(LeaseError::from)?;
            Err::<(), BoomError>(BoomError)
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"API_KEY = 1\n");
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn success_leaves_the_written_content_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let backups_root = dir.path().join("backups");
        let target = dir.path().join("main.tf");
        fs::write(&target, b"old\n").unwrap();

        let backups = BackupDir::new(&backups_root, "wf-2");
        let result: Result<(), LeaseError> = with_file_lease(&backups, &[target.clone()], |writer| {
            writer.write(&target, b"new\n").map_err(LeaseError::from)
        });

        assert!(result.is_ok());
        assert_eq!(fs::read(&target).unwrap(), b"new\n");
    }

    #[test]
    fn rollback_removes_a_file_that_did_not_exist_before_the_lease() {
        let dir = tempfile::tempdir().unwrap();
        let backups_root = dir.path().join("backups");
        let target = dir.path().join("new_file.py");

        let backups = BackupDir::new(&backups_root, "wf-3");
        let result: Result<(), LeaseError> = with_file_lease(&backups, &[target.clone()], |writer| {
            writer.write(&target, b"created\n").map_err(LeaseError::from)?;
            Err::<(), BoomError>(BoomError)
        });

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
