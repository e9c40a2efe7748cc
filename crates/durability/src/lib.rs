//! Durability layer for jsonvault
//!
//! This crate handles everything that touches disk:
//!
//! - Store layout: primary file plus sibling `backup/` directory
//! - Document format: one pretty-printed JSON object of `{class, value}` envelopes
//! - Crash-safe primary writes (write-fsync-rename)
//! - Rolling backups: naming, listing, retention pruning
//! - Recovery: primary first, then backups newest first

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod document;
pub mod error;
pub mod paths;
pub mod recovery;
pub mod writer;

pub use backup::{BackupFile, BackupManager, SnapshotInfo};
pub use document::{parse_document, read_document, serialize_document, EntryMap};
pub use error::{ReadError, WriteError};
pub use paths::{StorePaths, BACKUP_DIR_NAME, BACKUP_SEPARATOR};
pub use recovery::{recover_document, RecoveredDocument, RecoverySource};
