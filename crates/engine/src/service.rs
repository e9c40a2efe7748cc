//! Named storages under one directory
//!
//! `StorageService` hands out one shared [`JsonStorage`] per storage name.
//! A storage named `name` lives in `<directory>/<encoded name>.json`, where
//! every byte outside `[A-Za-z0-9._-]` is percent-encoded, so any name maps
//! to a single safe file name.
//!
//! Asking again for an open name returns the same instance, as long as the
//! value type matches.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonvault_core::{DocumentMapper, StorageMigration, Tagged, TypeResolver};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{StorageConfig, StorageOptions};
use crate::error::{StoreError, StoreResult};
use crate::storage::JsonStorage;

/// File extension of storage files
pub const STORAGE_FILE_EXTENSION: &str = "json";

/// Type-erased lifecycle of an open storage
trait ManagedStorage: Send + Sync {
    fn flush(&self) -> StoreResult<bool>;
    fn close(&self) -> StoreResult<bool>;
}

impl<V> ManagedStorage for JsonStorage<V>
where
    V: Serialize + Tagged + 'static,
{
    fn flush(&self) -> StoreResult<bool> {
        JsonStorage::flush(self)
    }

    fn close(&self) -> StoreResult<bool> {
        JsonStorage::close(self)
    }
}

struct OpenStorage {
    instance: Arc<dyn Any + Send + Sync>,
    managed: Arc<dyn ManagedStorage>,
}

/// Opens and tracks the storages of one database directory
pub struct StorageService {
    directory: PathBuf,
    config: StorageConfig,
    mapper: DocumentMapper,
    open: Mutex<HashMap<String, OpenStorage>>,
}

impl StorageService {
    /// Create a service rooted at `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>, config: StorageConfig) -> StoreResult<Self> {
        config.validate()?;
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        debug!(target: "jsonvault::service", dir = %directory.display(), "Storage service started");

        Ok(StorageService {
            directory,
            config,
            mapper: DocumentMapper::new(),
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Use `mapper` for storages opened from now on
    pub fn with_mapper(mut self, mapper: DocumentMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Database directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Open (or return the already open) storage called `name`
    ///
    /// # Errors
    ///
    /// [`StoreError::TypeMismatch`] if `name` is open with another value
    /// type, or whatever [`JsonStorage::open`] fails with.
    pub fn get_storage<V>(
        &self,
        name: &str,
        resolver: Arc<dyn TypeResolver<V>>,
    ) -> StoreResult<Arc<JsonStorage<V>>>
    where
        V: Serialize + Tagged + Send + Sync + 'static,
    {
        self.get_storage_with_migrations(name, resolver, Vec::new())
    }

    /// Like [`get_storage`](Self::get_storage), running `migrations` if the
    /// storage is not open yet
    pub fn get_storage_with_migrations<V>(
        &self,
        name: &str,
        resolver: Arc<dyn TypeResolver<V>>,
        migrations: Vec<Box<dyn StorageMigration>>,
    ) -> StoreResult<Arc<JsonStorage<V>>>
    where
        V: Serialize + Tagged + Send + Sync + 'static,
    {
        let mut open = self.open.lock();

        if let Some(existing) = open.get(name) {
            return Arc::clone(&existing.instance)
                .downcast::<JsonStorage<V>>()
                .map_err(|_| StoreError::TypeMismatch {
                    name: name.to_string(),
                });
        }

        let mut options = StorageOptions::from_resolver(resolver)
            .with_config(self.config.clone())
            .with_mapper(self.mapper.clone());
        options.migrations = migrations;

        let path = self.storage_path(name);
        let storage = Arc::new(JsonStorage::open(&path, options)?);
        info!(target: "jsonvault::service", name, path = %path.display(), "Opened storage");

        open.insert(
            name.to_string(),
            OpenStorage {
                instance: Arc::clone(&storage) as Arc<dyn Any + Send + Sync>,
                managed: Arc::clone(&storage) as Arc<dyn ManagedStorage>,
            },
        );
        Ok(storage)
    }

    /// File backing the storage called `name`
    pub fn storage_path(&self, name: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", encode_storage_name(name), STORAGE_FILE_EXTENSION))
    }

    /// Names of the storages currently open, sorted
    pub fn storage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.open.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush every open storage
    ///
    /// Returns how many storages wrote something. Every storage is tried;
    /// the first error is returned.
    pub fn flush_all(&self) -> StoreResult<usize> {
        let managed: Vec<(String, Arc<dyn ManagedStorage>)> = self
            .open
            .lock()
            .iter()
            .map(|(name, open)| (name.clone(), Arc::clone(&open.managed)))
            .collect();

        let mut written = 0;
        let mut first_error = None;
        for (name, storage) in managed {
            match storage.flush() {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(target: "jsonvault::service", name = %name, error = %e, "Flush failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Close every open storage and forget it
    ///
    /// Handles still held by callers stay usable, but their commit threads
    /// are stopped.
    pub fn shutdown(&self) -> StoreResult<()> {
        let drained: Vec<(String, OpenStorage)> = self.open.lock().drain().collect();

        let mut first_error = None;
        for (name, open) in drained {
            if let Err(e) = open.managed.close() {
                error!(target: "jsonvault::service", name = %name, error = %e, "Close failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        info!(target: "jsonvault::service", dir = %self.directory.display(), "Storage service stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("directory", &self.directory)
            .field("config", &self.config)
            .field("open", &self.storage_names())
            .finish()
    }
}

/// Percent-encode a storage name into a file stem
pub fn encode_storage_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char)
            }
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}
