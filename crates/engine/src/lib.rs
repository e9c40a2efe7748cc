//! Storage engine for jsonvault
//!
//! This crate ties the lower layers together:
//! - JsonStorage: live map, lazy decode, open/close
//! - CommitScheduler: deferred commits with a deferral cap
//! - Startup migrations and the load/recovery sequence
//! - StorageConfig / StorageOptions: construction-time settings
//! - StorageService: named storages under one directory
//!
//! The engine is the only component that knows about timing; the durability
//! crate below it writes and reads files when asked.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod migration;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use config::{ConfigError, StorageConfig, StorageOptions};
pub use error::{StoreError, StoreResult};
pub use migration::{migrate_entries, MigrationReport};
pub use scheduler::{CommitDecision, CommitScheduler};
pub use service::{encode_storage_name, StorageService, STORAGE_FILE_EXTENSION};
pub use storage::JsonStorage;
