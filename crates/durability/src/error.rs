//! Durability error types
//!
//! Read failures are never fatal: both variants of [`ReadError`] send the
//! recovery sequence on to the next backup candidate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain a document from one file
#[derive(Debug, Error)]
pub enum ReadError {
    /// File absent or unreadable
    #[error("Cannot read {path}: {source}")]
    Unavailable {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// File content is not a well-formed document
    #[error("Malformed document {path}: {message}")]
    Parse {
        /// File that was read
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

impl ReadError {
    /// Path of the file the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            ReadError::Unavailable { path, .. } | ReadError::Parse { path, .. } => path,
        }
    }
}

/// Failure to persist a document
#[derive(Debug, Error)]
pub enum WriteError {
    /// I/O failure writing the primary file or a backup
    #[error("Cannot write {path}: {source}")]
    Io {
        /// File being written
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The in-memory map could not be rendered as JSON
    #[error("Cannot serialize document: {0}")]
    Serialize(String),
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WriteError::Io {
            path: path.into(),
            source,
        }
    }
}
