//! Store configuration
//!
//! Settings can be built in code or read from a TOML file:
//!
//! ```toml
//! # Number of rolling backups kept next to the store file (default: 5)
//! backup_files = 5
//!
//! # Quiet period before coalesced mutations are written (default: 500)
//! write_delay_ms = 500
//!
//! # Upper bound on how long a burst of mutations can postpone a write
//! # (default: 60000)
//! max_deferred_period_ms = 60000
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonvault_core::{DocumentMapper, StorageMigration, TypeResolver};
use serde::Deserialize;

/// Default number of backups kept
pub const DEFAULT_BACKUP_FILES: usize = 5;
/// Default write delay in milliseconds
pub const DEFAULT_WRITE_DELAY_MS: u64 = 500;
/// Default deferral cap in milliseconds
pub const DEFAULT_MAX_DEFERRED_PERIOD_MS: u64 = 60_000;

/// Persistence tuning for one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backups retained after each flush
    pub max_backup_files: usize,
    /// Quiet period after the last mutation before a flush
    pub write_delay: Duration,
    /// Longest a dirty store may go unflushed while mutations keep arriving
    pub max_deferred_period: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_backup_files: DEFAULT_BACKUP_FILES,
            write_delay: Duration::from_millis(DEFAULT_WRITE_DELAY_MS),
            max_deferred_period: Duration::from_millis(DEFAULT_MAX_DEFERRED_PERIOD_MS),
        }
    }
}

impl StorageConfig {
    /// Create config for testing
    ///
    /// Uses short delays so tests settle quickly.
    pub fn for_testing() -> Self {
        StorageConfig {
            max_backup_files: 2,
            write_delay: Duration::from_millis(50),
            max_deferred_period: Duration::from_secs(1),
        }
    }

    /// Set the backup retention count
    pub fn with_max_backup_files(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    /// Set the write delay
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Set the deferral cap
    pub fn with_max_deferred_period(mut self, period: Duration) -> Self {
        self.max_deferred_period = period;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_deferred_period.is_zero() && !self.write_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "max_deferred_period must be non-zero when write_delay is non-zero".to_string(),
            ));
        }
        let now = Instant::now();
        for (name, period) in [
            ("write_delay", self.write_delay),
            ("max_deferred_period", self.max_deferred_period),
        ] {
            if now.checked_add(period).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} of {:?} is too long to schedule",
                    name, period
                )));
            }
        }
        Ok(())
    }

    /// Parse config from TOML text
    ///
    /// Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: StorageConfigFile =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = StorageConfig::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }
}

/// On-disk form of [`StorageConfig`]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageConfigFile {
    #[serde(default = "default_backup_files")]
    backup_files: usize,
    #[serde(default = "default_write_delay_ms")]
    write_delay_ms: u64,
    #[serde(default = "default_max_deferred_period_ms")]
    max_deferred_period_ms: u64,
}

fn default_backup_files() -> usize {
    DEFAULT_BACKUP_FILES
}

fn default_write_delay_ms() -> u64 {
    DEFAULT_WRITE_DELAY_MS
}

fn default_max_deferred_period_ms() -> u64 {
    DEFAULT_MAX_DEFERRED_PERIOD_MS
}

impl From<StorageConfigFile> for StorageConfig {
    fn from(file: StorageConfigFile) -> Self {
        StorageConfig {
            max_backup_files: file.backup_files,
            write_delay: Duration::from_millis(file.write_delay_ms),
            max_deferred_period: Duration::from_millis(file.max_deferred_period_ms),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("{0}")]
    Io(String),

    /// Config text is not valid TOML for this schema
    #[error("Invalid config file: {0}")]
    Parse(String),

    /// Values are inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything a store needs at open besides its path
///
/// The resolver is the type-loading context: it decides which recorded
/// type names can be decoded by this store.
pub struct StorageOptions<V> {
    /// Persistence tuning
    pub config: StorageConfig,
    /// Recorded type name → decoder
    pub resolver: Arc<dyn TypeResolver<V>>,
    /// Value ⇄ document mapper
    pub mapper: DocumentMapper,
    /// Startup migrations, applied in order
    pub migrations: Vec<Box<dyn StorageMigration>>,
}

impl<V> StorageOptions<V> {
    /// Options with default config, no adapters and no migrations
    pub fn new(resolver: impl TypeResolver<V> + 'static) -> Self {
        Self::from_resolver(Arc::new(resolver))
    }

    /// Options sharing an existing resolver
    pub fn from_resolver(resolver: Arc<dyn TypeResolver<V>>) -> Self {
        StorageOptions {
            config: StorageConfig::default(),
            resolver,
            mapper: DocumentMapper::new(),
            migrations: Vec::new(),
        }
    }

    /// Set the persistence config
    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the document mapper
    pub fn with_mapper(mut self, mapper: DocumentMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Append a startup migration
    pub fn with_migration(mut self, migration: impl StorageMigration + 'static) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }
}

impl<V> fmt::Debug for StorageOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("config", &self.config)
            .field("mapper", &self.mapper)
            .field("migrations", &self.migrations.len())
            .finish_non_exhaustive()
    }
}
