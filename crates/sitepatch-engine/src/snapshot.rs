//! Timestamped, byte-identical backups
//!
//! A backup sits beside its artifact as `<file name>.bak-<YYYYmmdd-HHMMSS>`.
//! Backups are never overwritten: a name already taken gets `-1`, `-2`, ...
//! appended. One stamp is shared by every backup of a run.

use crate::error::SnapshotError;
use sitepatch_artifact::ContentHash;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `chrono` format of the run stamp
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const BACKUP_INFIX: &str = ".bak-";

/// A backup file found on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Backup {
    /// Run stamp
    pub stamp: String,
    /// Collision disambiguator, `0` when absent
    pub counter: u32,
    pub path: PathBuf,
}

/// Result of restoring a backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    /// Artifact that was overwritten
    pub artifact: PathBuf,
    /// Backup of the artifact's content before the restore
    pub previous: Option<PathBuf>,
}

/// Writes and manages artifact backups
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    stamp: String,
    retain: Option<usize>,
}

impl SnapshotManager {
    /// Manager using a fixed run stamp
    #[must_use]
    pub fn new(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            retain: None,
        }
    }

    /// Manager stamped with the current local time
    #[must_use]
    pub fn from_now() -> Self {
        Self::new(chrono::Local::now().format(STAMP_FORMAT).to_string())
    }

    /// Keep only the newest `keep_last` backups per artifact
    #[must_use]
    pub fn with_retention(mut self, keep_last: Option<usize>) -> Self {
        self.retain = keep_last;
        self
    }

    /// Run stamp
    #[inline]
    #[must_use]
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Copy the current on-disk bytes of `path` to a new backup
    ///
    /// Returns `Ok(None)` if the artifact does not exist. Never touches the
    /// artifact itself.
    ///
    /// # Errors
    /// Fails if the artifact cannot be read or the backup cannot be written
    /// in full.
    pub fn snapshot(&self, path: &Path) -> Result<Option<PathBuf>, SnapshotError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SnapshotError::read_error(path, err)),
        };
        let file_name = file_name(path)?;

        let mut counter = 0u32;
        let backup = loop {
            let candidate = path.with_file_name(backup_name(&file_name, &self.stamp, counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut file) => {
                    file.write_all(&bytes)
                        .and_then(|()| file.sync_all())
                        .map_err(|e| SnapshotError::write_error(&candidate, e))?;
                    break candidate;
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(err) => return Err(SnapshotError::write_error(&candidate, err)),
            }
        };
        info!(artifact = %path.display(), backup = %backup.display(), "backup written");

        if self.retain.is_some() {
            self.prune(path)?;
        }
        Ok(Some(backup))
    }

    /// Backups of `path`, oldest first
    ///
    /// # Errors
    /// Fails if the artifact's directory cannot be listed.
    pub fn backups(path: &Path) -> Result<Vec<Backup>, SnapshotError> {
        let file_name = file_name(path)?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let entries =
            fs::read_dir(&dir).map_err(|e| SnapshotError::housekeeping_error(&dir, e))?;
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SnapshotError::housekeeping_error(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some((artifact, stamp, counter)) = parse_backup_name(name) {
                if artifact == file_name {
                    backups.push(Backup {
                        stamp: stamp.to_owned(),
                        counter,
                        path: path.with_file_name(name),
                    });
                }
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Delete the oldest backups of `path` beyond the retention limit
    ///
    /// Returns the deleted paths. A no-op without a retention limit.
    ///
    /// # Errors
    /// Fails if listing or deleting backups fails.
    pub fn prune(&self, path: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
        let Some(keep) = self.retain else {
            return Ok(Vec::new());
        };
        let backups = Self::backups(path)?;
        let excess = backups.len().saturating_sub(keep);

        let mut removed = Vec::with_capacity(excess);
        for backup in backups.into_iter().take(excess) {
            fs::remove_file(&backup.path)
                .map_err(|e| SnapshotError::housekeeping_error(&backup.path, e))?;
            debug!(backup = %backup.path.display(), "pruned backup");
            removed.push(backup.path);
        }
        Ok(removed)
    }

    /// Copy `backup` back over its artifact, byte for byte
    ///
    /// The artifact's current content is backed up first.
    ///
    /// # Errors
    /// Fails if `backup` is not named like a backup, cannot be read, the
    /// safety backup or the write fails, or the restored bytes differ.
    pub fn restore(&self, backup: &Path) -> Result<Restored, SnapshotError> {
        let name = file_name(backup)?;
        let Some((artifact_name, _, _)) = parse_backup_name(&name) else {
            return Err(SnapshotError::NotABackup(backup.to_path_buf()));
        };
        let artifact = backup.with_file_name(artifact_name);

        let bytes = fs::read(backup).map_err(|e| SnapshotError::read_error(backup, e))?;
        let previous = self.snapshot(&artifact)?;
        fs::write(&artifact, &bytes).map_err(|e| SnapshotError::write_error(&artifact, e))?;

        let written = fs::read(&artifact).map_err(|e| SnapshotError::read_error(&artifact, e))?;
        if ContentHash::compute(&written) != ContentHash::compute(&bytes) {
            return Err(SnapshotError::VerifyFailed(artifact));
        }
        info!(artifact = %artifact.display(), backup = %backup.display(), "backup restored");

        Ok(Restored { artifact, previous })
    }
}

fn file_name(path: &Path) -> Result<String, SnapshotError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| SnapshotError::NotABackup(path.to_path_buf()))
}

fn backup_name(file_name: &str, stamp: &str, counter: u32) -> String {
    if counter == 0 {
        format!("{file_name}{BACKUP_INFIX}{stamp}")
    } else {
        format!("{file_name}{BACKUP_INFIX}{stamp}-{counter}")
    }
}

/// Split a backup file name into artifact name, stamp and counter
fn parse_backup_name(name: &str) -> Option<(&str, &str, u32)> {
    let idx = name.rfind(BACKUP_INFIX)?;
    let (artifact, suffix) = (&name[..idx], &name[idx + BACKUP_INFIX.len()..]);
    if artifact.is_empty() || suffix.len() < 15 || !suffix.is_char_boundary(15) {
        return None;
    }

    let (stamp, rest) = suffix.split_at(15);
    let bytes = stamp.as_bytes();
    let well_formed = bytes.iter().enumerate().all(|(i, b)| {
        if i == 8 {
            *b == b'-'
        } else {
            b.is_ascii_digit()
        }
    });
    if !well_formed {
        return None;
    }

    let counter = match rest {
        "" => 0,
        _ => rest.strip_prefix('-')?.parse().ok()?,
    };
    Some((artifact, stamp, counter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STAMP: &str = "20260101-120000";

    #[test]
    fn parse_backup_names() {
        assert_eq!(
            parse_backup_name("index.html.bak-20260101-120000"),
            Some(("index.html", STAMP, 0))
        );
        assert_eq!(
            parse_backup_name("index.html.bak-20260101-120000-3"),
            Some(("index.html", STAMP, 3))
        );
        assert_eq!(parse_backup_name("index.html.bak-2026"), None);
        assert_eq!(parse_backup_name("index.html.bak-20260101x120000"), None);
        assert_eq!(parse_backup_name("index.html"), None);
        assert_eq!(parse_backup_name(".bak-20260101-120000"), None);
    }

    #[test]
    fn snapshot_missing_artifact_is_noop() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(STAMP);
        assert_eq!(manager.snapshot(&dir.path().join("absent.css")).unwrap(), None);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn snapshot_is_byte_identical_and_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        let bytes = b"<p>caf\xe9</p>\r\n".to_vec();
        fs::write(&path, &bytes).unwrap();

        let manager = SnapshotManager::new(STAMP);
        let first = manager.snapshot(&path).unwrap().unwrap();
        fs::write(&path, b"changed").unwrap();
        let second = manager.snapshot(&path).unwrap().unwrap();

        assert_eq!(first.file_name().unwrap(), "index.html.bak-20260101-120000");
        assert_eq!(second.file_name().unwrap(), "index.html.bak-20260101-120000-1");
        assert_eq!(fs::read(&first).unwrap(), bytes);
        assert_eq!(fs::read(&second).unwrap(), b"changed");
    }

    #[test]
    fn snapshot_write_failure_leaves_artifact_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "<main></main>").unwrap();

        let manager = SnapshotManager::new("gone/20260101-120000");
        let err = manager.snapshot(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Write { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<main></main>");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn backups_sorted_and_filtered_by_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("styles.css");
        fs::write(&path, "a{}").unwrap();
        fs::write(dir.path().join("styles.css.bak-20250101-000000"), "").unwrap();
        fs::write(dir.path().join("styles.css.bak-20240101-000000"), "").unwrap();
        fs::write(dir.path().join("script.js.bak-20240101-000000"), "").unwrap();

        let backups = SnapshotManager::backups(&path).unwrap();
        let stamps: Vec<&str> = backups.iter().map(|b| b.stamp.as_str()).collect();
        assert_eq!(stamps, vec!["20240101-000000", "20250101-000000"]);
    }

    #[test]
    fn retention_prunes_oldest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.js");
        fs::write(&path, "run();").unwrap();
        fs::write(dir.path().join("script.js.bak-20240101-000000"), "old").unwrap();
        fs::write(dir.path().join("script.js.bak-20250101-000000"), "newer").unwrap();

        let manager = SnapshotManager::new(STAMP).with_retention(Some(2));
        manager.snapshot(&path).unwrap();

        let backups = SnapshotManager::backups(&path).unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].stamp, "20250101-000000");
        assert_eq!(backups[1].stamp, STAMP);
    }

    #[test]
    fn restore_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "original").unwrap();

        let manager = SnapshotManager::new(STAMP);
        let backup = manager.snapshot(&path).unwrap().unwrap();
        fs::write(&path, "patched").unwrap();

        let restored = manager.restore(&backup).unwrap();
        assert_eq!(restored.artifact, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        let previous = restored.previous.unwrap();
        assert_eq!(fs::read_to_string(previous).unwrap(), "patched");
    }

    #[test]
    fn restore_rejects_non_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "x").unwrap();
        let err = SnapshotManager::new(STAMP).restore(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::NotABackup(_)));
    }
}
