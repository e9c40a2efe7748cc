//! JSON-file backed storage
//!
//! `JsonStorage` keeps the live key → entry map in memory and persists the
//! whole map as one JSON document. Mutations update the map, then hand the
//! write to the [`CommitScheduler`]; a dedicated commit thread performs the
//! flush once mutations go quiet, or immediately once the deferral cap is
//! exceeded. Every flush rewrites the primary file and adds one backup.
//!
//! # Opening
//!
//! 1. Remove a temporary file left by an interrupted write
//! 2. If migrations are configured: recover the document, migrate it, write
//!    it back through a regular flush, then clear the map
//! 3. Recover the document (primary, then backups newest first) and load it
//! 4. Start the commit thread
//!
//! Payloads are not decoded while loading; `get` and `values` decode lazily.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use jsonvault_core::{EntryCodec, Storage, StorageEntry, StorageMigration, Tagged, TypeResolver};
use jsonvault_durability::{
    recover_document, serialize_document, BackupManager, EntryMap, SnapshotInfo, StorePaths,
    WriteError,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{StorageConfig, StorageOptions};
use crate::error::StoreResult;
use crate::migration::{migrate_entries, MigrationReport};
use crate::scheduler::{CommitDecision, CommitScheduler};

/// State shared between callers and the commit thread
struct StorageInner<V> {
    map: DashMap<String, StorageEntry>,
    codec: EntryCodec<V>,
    backups: BackupManager,
    scheduler: CommitScheduler,
}

impl<V> StorageInner<V> {
    fn flush(&self) -> StoreResult<bool> {
        let written = self.scheduler.flush_with(|| self.write_snapshot())?;
        Ok(written.is_some())
    }

    fn write_snapshot(&self) -> Result<SnapshotInfo, WriteError> {
        let snapshot: BTreeMap<String, StorageEntry> = self
            .map
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        let document = serialize_document(&snapshot)?;

        let info = self.backups.write_snapshot(&document)?;
        debug!(
            target: "jsonvault::storage",
            path = %info.primary.display(),
            entries = snapshot.len(),
            bytes = info.bytes,
            pruned = info.pruned,
            "Store flushed"
        );
        Ok(info)
    }

    fn decode(&self, key: &str, entry: &StorageEntry) -> Option<V> {
        match self.codec.decode(entry) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(
                    target: "jsonvault::storage",
                    key = %key,
                    type_name = entry.type_name(),
                    error = %e,
                    "Couldn't deserialize value"
                );
                None
            }
        }
    }

    fn populate(&self, entries: EntryMap) {
        for (key, entry) in entries {
            self.map.insert(key, entry);
        }
    }

    /// Read the store from disk into the live map
    fn load(&self) {
        match recover_document(&self.backups) {
            Some(document) => {
                info!(
                    target: "jsonvault::storage",
                    path = %document.path.display(),
                    source = ?document.source,
                    entries = document.entries.len(),
                    "Store loaded"
                );
                self.populate(document.entries);
            }
            None => debug!(
                target: "jsonvault::storage",
                path = %self.backups.primary().display(),
                "No readable store file, starting empty"
            ),
        }
    }

    /// Migrate the on-disk document and write it back
    ///
    /// The live map is left empty; `load` reads the result back from disk.
    fn migrate(&self, migrations: &[Box<dyn StorageMigration>]) -> MigrationReport {
        let Some(mut document) = recover_document(&self.backups) else {
            debug!(target: "jsonvault::migration", "Nothing to migrate");
            return MigrationReport::default();
        };

        let report = migrate_entries(&mut document.entries, migrations, self.codec.mapper());
        info!(
            target: "jsonvault::migration",
            examined = report.examined,
            migrated = report.migrated,
            skipped = report.skipped,
            "Migration pass complete"
        );

        self.populate(document.entries);
        self.scheduler.mark_dirty();
        if let Err(e) = self.flush() {
            error!(target: "jsonvault::migration", error = %e, "Migrated store could not be written");
        }
        self.map.clear();
        self.scheduler.mark_clean();
        report
    }
}

/// A persistent key/value store backed by one JSON file
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct JsonStorage<V> {
    inner: Arc<StorageInner<V>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<V> JsonStorage<V>
where
    V: Serialize + Tagged + 'static,
{
    /// Open the store at `path`, recovering whatever is on disk
    ///
    /// # Errors
    ///
    /// Invalid config, an unusable path, or failure to start the commit
    /// thread. Unreadable store files are not errors: the store falls back
    /// to backups and then to empty.
    pub fn open(path: impl AsRef<Path>, options: StorageOptions<V>) -> StoreResult<Self> {
        let StorageOptions {
            config,
            resolver,
            mapper,
            migrations,
        } = options;
        config.validate()?;

        let paths = StorePaths::from_primary(path.as_ref())?;
        fs::create_dir_all(paths.data_dir())?;

        let backups = BackupManager::new(paths, config.max_backup_files);
        if let Err(e) = backups.cleanup_temp_files() {
            warn!(
                target: "jsonvault::storage",
                path = %backups.paths().temp_file().display(),
                error = %e,
                "Cannot remove stale temporary file"
            );
        }

        let inner = Arc::new(StorageInner {
            map: DashMap::new(),
            codec: EntryCodec::new(mapper, resolver),
            backups,
            scheduler: CommitScheduler::new(config.write_delay, config.max_deferred_period),
        });

        if !migrations.is_empty() {
            inner.migrate(&migrations);
        }
        inner.load();

        let timer = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("jsonvault-commit".to_string())
                .spawn(move || {
                    inner.scheduler.run_timer(|| {
                        if let Err(e) = inner.flush() {
                            error!(
                                target: "jsonvault::storage",
                                path = %inner.backups.primary().display(),
                                error = %e,
                                "Deferred flush failed, will retry"
                            );
                        }
                    })
                })?
        };

        Ok(JsonStorage {
            inner,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Open with default options around a resolver
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: StorageConfig,
        resolver: impl TypeResolver<V> + 'static,
    ) -> StoreResult<Self> {
        Self::open(path, StorageOptions::new(resolver).with_config(config))
    }

    /// Store `value` under `key`, returning the previous value
    ///
    /// `None` removes the key. A value that cannot be encoded is logged and
    /// leaves the store unchanged.
    pub fn put(&self, key: &str, value: impl Into<Option<V>>) -> Option<V> {
        let Some(value) = value.into() else {
            return self.remove(key);
        };

        let entry = match self.inner.codec.encode(&value) {
            Ok(entry) => entry,
            Err(e) => {
                error!(
                    target: "jsonvault::storage",
                    key = %key,
                    type_name = value.type_name(),
                    error = %e,
                    "Couldn't serialize value"
                );
                return None;
            }
        };

        let previous = self.inner.map.insert(key.to_string(), entry);
        self.commit();
        previous.and_then(|entry| self.inner.decode(key, &entry))
    }

    /// Remove `key`, returning the previous value
    pub fn remove(&self, key: &str) -> Option<V> {
        let previous = self.inner.map.remove(key);
        self.commit();
        previous.and_then(|(_, entry)| self.inner.decode(key, &entry))
    }

    fn commit(&self) {
        if self.inner.scheduler.record_mutation() == CommitDecision::Forced {
            debug!(target: "jsonvault::storage", "Deferral cap exceeded, flushing now");
        }
    }

    /// Current value of `key`; None if absent or undecodable
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.map.get(key).map(|item| item.value().clone())?;
        self.inner.decode(key, &entry)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.map.contains_key(key)
    }

    /// Snapshot of the current keys
    pub fn keys(&self) -> Vec<String> {
        self.inner.map.iter().map(|item| item.key().clone()).collect()
    }

    /// Decode every entry; undecodable entries yield None
    pub fn values(&self) -> Vec<Option<V>> {
        let entries: Vec<(String, StorageEntry)> = self
            .inner
            .map
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        entries
            .iter()
            .map(|(key, entry)| self.inner.decode(key, entry))
            .collect()
    }

    /// Recorded type name of `key`'s entry
    pub fn type_name_of(&self, key: &str) -> Option<String> {
        self.inner
            .map
            .get(key)
            .map(|item| item.value().type_name().to_string())
    }
}

impl<V> JsonStorage<V> {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    /// Whether the store has no entries
    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }

    /// Whether mutations are waiting to be written
    pub fn is_dirty(&self) -> bool {
        self.inner.scheduler.is_dirty()
    }

    /// Primary file path
    pub fn path(&self) -> &Path {
        self.inner.backups.primary()
    }

    /// Backup manager of this store
    pub fn backups(&self) -> &BackupManager {
        &self.inner.backups
    }

    /// Write pending mutations now
    ///
    /// Returns whether anything was written. A no-op when clean.
    pub fn flush(&self) -> StoreResult<bool> {
        self.inner.flush()
    }

    /// Stop the commit thread and write pending mutations
    ///
    /// Later mutations are kept in memory and written only by an explicit
    /// [`flush`](Self::flush).
    pub fn close(&self) -> StoreResult<bool> {
        self.stop_timer();
        self.inner.flush()
    }

    fn stop_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            self.inner.scheduler.shutdown();
            if handle.join().is_err() {
                error!(target: "jsonvault::storage", "Commit thread panicked");
            }
        }
    }
}

impl<V> Drop for JsonStorage<V> {
    fn drop(&mut self) {
        self.stop_timer();
        if let Err(e) = self.inner.flush() {
            error!(
                target: "jsonvault::storage",
                path = %self.inner.backups.primary().display(),
                error = %e,
                "Final flush failed"
            );
        }
    }
}

impl<V> std::fmt::Debug for JsonStorage<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStorage")
            .field("path", &self.inner.backups.primary())
            .field("entries", &self.inner.map.len())
            .field("dirty", &self.inner.scheduler.is_dirty())
            .finish()
    }
}

impl<V> Storage<V> for JsonStorage<V>
where
    V: Serialize + Tagged + 'static,
{
    fn put(&self, key: &str, value: impl Into<Option<V>>) -> Option<V> {
        JsonStorage::put(self, key, value)
    }

    fn remove(&self, key: &str) -> Option<V> {
        JsonStorage::remove(self, key)
    }

    fn get(&self, key: &str) -> Option<V> {
        JsonStorage::get(self, key)
    }

    fn contains_key(&self, key: &str) -> bool {
        JsonStorage::contains_key(self, key)
    }

    fn keys(&self) -> Vec<String> {
        JsonStorage::keys(self)
    }

    fn values(&self) -> Vec<Option<V>> {
        JsonStorage::values(self)
    }
}
