//! Shared test utilities for the integration test suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub use jsonvault::{
    JsonStorage, StorageConfig, StorageOptions, Tagged, TypeRegistry, TypeResolver,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// ============================================================================
// Domain values
// ============================================================================

pub const THING: &str = "acme.Thing";
pub const BRIDGE: &str = "acme.Bridge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub uid: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    pub uid: String,
    pub host: String,
    pub port: u16,
}

/// Heterogeneous store value; serializes as the inner shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Element {
    Thing(Thing),
    Bridge(Bridge),
}

impl Tagged for Element {
    fn type_name(&self) -> &str {
        match self {
            Element::Thing(_) => THING,
            Element::Bridge(_) => BRIDGE,
        }
    }
}

impl From<Thing> for Element {
    fn from(thing: Thing) -> Self {
        Element::Thing(thing)
    }
}

impl From<Bridge> for Element {
    fn from(bridge: Bridge) -> Self {
        Element::Bridge(bridge)
    }
}

pub fn thing(uid: &str, label: &str) -> Element {
    Element::Thing(Thing {
        uid: uid.to_string(),
        label: label.to_string(),
        enabled: true,
    })
}

pub fn bridge(uid: &str, port: u16) -> Element {
    Element::Bridge(Bridge {
        uid: uid.to_string(),
        host: "192.168.0.10".to_string(),
        port,
    })
}

pub fn element_registry() -> TypeRegistry<Element> {
    TypeRegistry::new()
        .register_as::<Thing>(THING)
        .register_as::<Bridge>(BRIDGE)
}

// ============================================================================
// TestStore - storage in a temporary directory
// ============================================================================

/// A storage file in its own temporary directory
pub struct TestStore {
    pub dir: TempDir,
    pub config: StorageConfig,
}

impl TestStore {
    /// Config with a long write delay so only explicit flushes write
    pub fn manual() -> Self {
        Self::with_config(
            StorageConfig::for_testing()
                .with_write_delay(Duration::from_secs(60))
                .with_max_deferred_period(Duration::from_secs(600)),
        )
    }

    pub fn with_config(config: StorageConfig) -> Self {
        TestStore {
            dir: TempDir::new().expect("Failed to create temp dir"),
            config,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("elements.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join(jsonvault::BACKUP_DIR_NAME)
    }

    pub fn open(&self) -> JsonStorage<Element> {
        self.open_with(StorageOptions::new(element_registry()))
    }

    pub fn open_with(&self, options: StorageOptions<Element>) -> JsonStorage<Element> {
        JsonStorage::open(self.path(), options.with_config(self.config.clone()))
            .expect("Failed to open storage")
    }

    /// Shared resolver for stores opened through a service
    pub fn resolver() -> Arc<dyn TypeResolver<Element>> {
        Arc::new(element_registry())
    }
}

/// Poll until `cond` holds or the timeout passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
