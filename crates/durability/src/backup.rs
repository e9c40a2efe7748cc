//! Rolling backups
//!
//! Every snapshot is written twice: over the primary file and into a new
//! backup named `<millis>--<primary name>`. Writing both at flush time,
//! rather than renaming the old primary into the backup directory, means a
//! valid file exists at every moment of the write.
//!
//! After each snapshot the oldest backups beyond the retention count are
//! deleted. Files in the backup directory whose names do not parse are
//! ignored, never deleted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::WriteError;
use crate::paths::StorePaths;
use crate::writer::{cleanup_temp_file, write_atomic, write_synced};

/// One backup file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// Timestamp parsed from the file name (milliseconds since epoch)
    pub timestamp: u64,
    /// Full path
    pub path: PathBuf,
}

/// Result of a successful snapshot write
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Primary file written
    pub primary: PathBuf,
    /// Backup written alongside, if retention allows any
    pub backup: Option<BackupFile>,
    /// Number of old backups deleted afterwards
    pub pruned: usize,
    /// Document size in bytes
    pub bytes: usize,
}

/// Names, lists, writes and prunes the backups of one store
#[derive(Debug)]
pub struct BackupManager {
    paths: StorePaths,
    max_backup_files: usize,
    /// Timestamp of the newest backup this manager knows of
    last_timestamp: Mutex<u64>,
}

impl BackupManager {
    /// Create a manager retaining at most `max_backup_files` backups
    pub fn new(paths: StorePaths, max_backup_files: usize) -> Self {
        let manager = BackupManager {
            paths,
            max_backup_files,
            last_timestamp: Mutex::new(0),
        };
        let newest = manager
            .list_backups()
            .ok()
            .and_then(|backups| backups.last().map(|b| b.timestamp))
            .unwrap_or(0);
        *manager.last_timestamp.lock() = newest;
        manager
    }

    /// Store layout
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Retention count
    pub fn max_backup_files(&self) -> usize {
        self.max_backup_files
    }

    /// List backups of this store, oldest first
    ///
    /// A missing backup directory yields an empty list.
    pub fn list_backups(&self) -> io::Result<Vec<BackupFile>> {
        let dir = self.paths.backup_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(timestamp) = self.paths.parse_backup_timestamp(&file_name) {
                backups.push(BackupFile {
                    timestamp,
                    path: entry.path(),
                });
            }
        }

        backups.sort_by_key(|b| b.timestamp);
        Ok(backups)
    }

    /// Backups to try during recovery, newest first
    ///
    /// Only the `max_backup_files` newest are considered; with retention 0
    /// there are no candidates.
    pub fn candidates_newest_first(&self) -> Vec<BackupFile> {
        match self.list_backups() {
            Ok(mut backups) => {
                backups.reverse();
                backups.truncate(self.max_backup_files);
                backups
            }
            Err(e) => {
                warn!(dir = %self.paths.backup_dir().display(), error = %e, "Cannot list backups");
                Vec::new()
            }
        }
    }

    /// Write `document` to the primary file and to a new backup, then prune
    ///
    /// # Errors
    ///
    /// The first I/O failure. A failed primary write skips the backup.
    /// Prune failures are logged, not returned.
    pub fn write_snapshot(&self, document: &str) -> Result<SnapshotInfo, WriteError> {
        let primary = self.paths.primary();
        write_atomic(primary, &self.paths.temp_file(), document.as_bytes())
            .map_err(|e| WriteError::io(primary, e))?;

        let backup = if self.max_backup_files > 0 {
            Some(self.write_backup(document)?)
        } else {
            None
        };

        let pruned = match self.prune() {
            Ok(pruned) => pruned,
            Err(e) => {
                warn!(dir = %self.paths.backup_dir().display(), error = %e, "Backup pruning failed");
                0
            }
        };

        Ok(SnapshotInfo {
            primary: primary.to_path_buf(),
            backup,
            pruned,
            bytes: document.len(),
        })
    }

    fn write_backup(&self, document: &str) -> Result<BackupFile, WriteError> {
        let dir = self.paths.backup_dir();
        fs::create_dir_all(dir).map_err(|e| WriteError::io(dir, e))?;

        let timestamp = self.next_timestamp();
        let path = self.paths.backup_file(timestamp);
        write_synced(&path, document.as_bytes()).map_err(|e| WriteError::io(&path, e))?;

        Ok(BackupFile { timestamp, path })
    }

    /// Delete all but the newest `max_backup_files` backups
    ///
    /// Returns the number of files deleted. Individual delete failures are
    /// logged and skipped.
    pub fn prune(&self) -> io::Result<usize> {
        let backups = self.list_backups()?;
        if backups.len() <= self.max_backup_files {
            return Ok(0);
        }

        let excess = backups.len() - self.max_backup_files;
        let mut removed = 0;
        for backup in backups.iter().take(excess) {
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    debug!(path = %backup.path.display(), "Deleted old backup");
                    removed += 1;
                }
                Err(e) => {
                    warn!(path = %backup.path.display(), error = %e, "Cannot delete old backup");
                }
            }
        }
        Ok(removed)
    }

    /// Remove a temporary primary file left by an interrupted write
    pub fn cleanup_temp_files(&self) -> io::Result<bool> {
        cleanup_temp_file(&self.paths.temp_file())
    }

    /// Wall-clock millis, bumped past the newest known backup
    fn next_timestamp(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let mut last = self.last_timestamp.lock();
        let next = now.max(last.saturating_add(1));
        *last = next;
        next
    }

    /// Primary document path
    pub fn primary(&self) -> &Path {
        self.paths.primary()
    }
}
