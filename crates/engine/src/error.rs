//! Engine error types
//!
//! Only opening a store and explicit flushes return errors. Reads and
//! mutations report problems through the log and return `Option`s.

use std::io;

use jsonvault_durability::WriteError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for engine operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error (directory creation, timer thread spawn)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisting the store failed
    #[error("Write failed: {0}")]
    Write(#[from] WriteError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A named storage is already open with another value type
    #[error("Storage '{name}' is already open with a different value type")]
    TypeMismatch {
        /// Storage name
        name: String,
    },
}
