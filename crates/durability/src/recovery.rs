//! Read-side recovery
//!
//! Tries the primary file first. If it is missing or does not parse, walks
//! the backups newest first until one parses. If nothing is readable the
//! caller starts with an empty store; that is not an error.

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::backup::BackupManager;
use crate::document::{read_document, EntryMap};

/// Where a recovered document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    /// The primary file
    Primary,
    /// A backup; `age` is 1 for the newest backup, 2 for the next, ...
    Backup {
        /// Timestamp from the backup file name
        timestamp: u64,
        /// Position counted from the newest backup
        age: usize,
    },
}

/// A document obtained by [`recover_document`]
#[derive(Debug)]
pub struct RecoveredDocument {
    /// Parsed entries
    pub entries: EntryMap,
    /// Which file they came from
    pub source: RecoverySource,
    /// Path of that file
    pub path: PathBuf,
}

/// Read the store document, falling back through backups newest first
///
/// Returns None when neither the primary nor any backup is readable.
pub fn recover_document(backups: &BackupManager) -> Option<RecoveredDocument> {
    let primary = backups.primary();
    let primary_exists = primary.exists();

    if primary_exists {
        match read_document(primary) {
            Ok(entries) => {
                return Some(RecoveredDocument {
                    entries,
                    source: RecoverySource::Primary,
                    path: primary.to_path_buf(),
                });
            }
            Err(e) => error!(path = %primary.display(), error = %e, "Error reading store document"),
        }
        info!(path = %primary.display(), "Store file seems to be corrupt - checking for a backup");
    } else {
        debug!(path = %primary.display(), "Store file does not exist - checking for a backup");
    }

    for (index, candidate) in backups.candidates_newest_first().into_iter().enumerate() {
        match read_document(&candidate.path) {
            Ok(entries) => {
                let age = index + 1;
                info!(path = %candidate.path.display(), age, "Store recovered from backup");
                return Some(RecoveredDocument {
                    entries,
                    source: RecoverySource::Backup {
                        timestamp: candidate.timestamp,
                        age,
                    },
                    path: candidate.path,
                });
            }
            Err(e) => {
                error!(path = %candidate.path.display(), error = %e, "Error reading backup document")
            }
        }
    }

    None
}
