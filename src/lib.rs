//! jsonvault - embedded JSON key/value store
//!
//! A process-embedded store that keeps a hot in-memory map of typed
//! entries and persists it as one JSON document. Writes are deferred and
//! coalesced, every flush leaves a timestamped backup next to the file,
//! and stored types can be migrated when the store is opened.
//!
//! # Quick Start
//!
//! ```ignore
//! use jsonvault::{JsonStorage, StorageConfig, StorageOptions, TypeRegistry};
//!
//! let registry = TypeRegistry::<String>::new().register::<String>();
//! let options = StorageOptions::new(registry).with_config(StorageConfig::default());
//! let storage = JsonStorage::open("data/things.json", options)?;
//!
//! storage.put("greeting", "hello".to_string());
//! assert_eq!(storage.get("greeting"), Some("hello".to_string()));
//! ```
//!
//! # Architecture
//!
//! - `jsonvault-core`: entries, type tagging, resolvers, mapper, migrations
//! - `jsonvault-durability`: document format, atomic writes, backups, recovery
//! - `jsonvault-engine`: `JsonStorage`, deferred commits, `StorageService`

pub use jsonvault_core::{
    CodecError, CodecResult, DocumentMapper, EntryCodec, ResolvedType, Storage, StorageEntry,
    StorageMigration, Tagged, TypeAdapter, TypeRegistry, TypeResolver, TypedMigration,
};
pub use jsonvault_durability::{
    BackupFile, BackupManager, ReadError, RecoverySource, StorePaths, WriteError,
    BACKUP_DIR_NAME,
};
pub use jsonvault_engine::{
    ConfigError, JsonStorage, MigrationReport, StorageConfig, StorageOptions, StorageService,
    StoreError, StoreResult,
};
