//! Integration tests for deferred commits and backup rotation
//!
//! These tests run real timers with short delays:
//! - Bursts of mutations coalesce into one flush
//! - Sustained mutation cannot postpone a flush past the deferral cap
//! - Backup retention after many flushes
//! - Concurrent writers
//! - Failed writes keep the store dirty

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jsonvault_core::TypeRegistry;
use jsonvault_durability::BACKUP_DIR_NAME;
use jsonvault_engine::{JsonStorage, StorageConfig, StorageOptions, StoreError};
use tempfile::TempDir;

fn config(backups: usize, delay_ms: u64, cap_ms: u64) -> StorageConfig {
    StorageConfig::default()
        .with_max_backup_files(backups)
        .with_write_delay(Duration::from_millis(delay_ms))
        .with_max_deferred_period(Duration::from_millis(cap_ms))
}

fn open(dir: &TempDir, config: StorageConfig) -> JsonStorage<String> {
    let options = StorageOptions::new(TypeRegistry::<String>::new().register::<String>())
        .with_config(config);
    JsonStorage::open(dir.path().join("store.json"), options).expect("Failed to open storage")
}

fn backup_count(storage: &JsonStorage<String>) -> usize {
    storage.backups().list_backups().unwrap().len()
}

/// Poll until the store is clean or the timeout passes
fn wait_clean(storage: &JsonStorage<String>, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !storage.is_dirty() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    !storage.is_dirty()
}

#[test]
fn test_burst_produces_one_flush() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(10, 150, 10_000));

    for i in 0..10 {
        storage.put(&format!("k{}", i), format!("v{}", i));
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!storage.path().exists(), "nothing written inside the window");

    assert!(wait_clean(&storage, Duration::from_secs(3)));
    thread::sleep(Duration::from_millis(200));

    assert!(storage.path().exists());
    assert_eq!(backup_count(&storage), 1);
}

#[test]
fn test_sustained_load_forces_flush() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(50, 100, 300));

    let start = Instant::now();
    let mut i = 0u64;
    while start.elapsed() < Duration::from_millis(1000) {
        storage.put("counter", i.to_string());
        i += 1;
        thread::sleep(Duration::from_millis(20));
    }

    // the write delay never elapsed, yet the cap forced writes
    assert!(
        backup_count(&storage) >= 2,
        "expected forced flushes, found {} backups",
        backup_count(&storage)
    );
}

#[test]
fn test_retention_after_many_flushes() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(3, 10_000, 60_000));

    for i in 0..7 {
        storage.put("k", format!("v{}", i));
        assert!(storage.flush().unwrap());
    }

    let backups = storage.backups().list_backups().unwrap();
    assert_eq!(backups.len(), 3);

    // the survivors are the newest three, each holding what was flushed
    let expected = ["v4", "v5", "v6"];
    for (backup, value) in backups.iter().zip(expected) {
        let text = std::fs::read_to_string(&backup.path).unwrap();
        assert!(text.contains(value), "{} should contain {}", text, value);
    }
}

#[test]
fn test_primary_and_backup_match() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(2, 10_000, 60_000));
    storage.put("a", "1".to_string());
    storage.flush().unwrap();

    let primary = std::fs::read_to_string(storage.path()).unwrap();
    let backups = storage.backups().list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read_to_string(&backups[0].path).unwrap(), primary);
}

#[test]
fn test_two_backup_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(2, 100, 60_000));

    storage.put("a", "X".to_string());
    assert!(wait_clean(&storage, Duration::from_secs(3)));
    assert!(storage.path().exists());
    assert_eq!(backup_count(&storage), 1);
    assert_eq!(storage.get("a"), Some("X".to_string()));

    storage.put("a", "Y".to_string());
    storage.put("b", "Z".to_string());
    assert!(wait_clean(&storage, Duration::from_secs(3)));
    thread::sleep(Duration::from_millis(150));

    assert_eq!(backup_count(&storage), 2);
    assert_eq!(storage.get("a"), Some("Y".to_string()));
    assert_eq!(storage.get("b"), Some("Z".to_string()));

    storage.put("c", "W".to_string());
    assert!(wait_clean(&storage, Duration::from_secs(3)));
    assert_eq!(backup_count(&storage), 2, "oldest backup pruned");
}

#[test]
fn test_zero_write_delay_flushes_promptly() {
    let temp_dir = TempDir::new().unwrap();
    let storage = open(&temp_dir, config(1, 0, 0));

    storage.put("k", "v".to_string());
    assert!(wait_clean(&storage, Duration::from_secs(3)));
    assert!(storage.path().exists());
}

#[test]
fn test_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(open(&temp_dir, config(2, 20, 200)));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                for i in 0..100 {
                    storage.put(&format!("t{}:k{}", t, i), format!("{}", i));
                    if i % 10 == 0 {
                        assert!(storage.get(&format!("t{}:k{}", t, i)).is_some());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(storage.len(), 800);
    storage.close().unwrap();
    drop(storage);

    let reopened = open(&temp_dir, config(2, 20, 200));
    assert_eq!(reopened.len(), 800);
    assert_eq!(reopened.get("t7:k99"), Some("99".to_string()));
}

#[test]
fn test_mutation_never_waits_for_flush() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(open(&temp_dir, config(2, 10_000, 60_000)));
    for i in 0..2000 {
        storage.put(&format!("k{}", i), "x".repeat(100));
    }

    let flusher = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || storage.flush().unwrap())
    };
    // mutations proceed while the flush runs
    for i in 0..100 {
        storage.put(&format!("late{}", i), "y".to_string());
    }
    flusher.join().unwrap();

    storage.flush().unwrap();
    assert!(!storage.is_dirty());
    let text = std::fs::read_to_string(storage.path()).unwrap();
    assert!(text.contains("late99"));
}

#[test]
fn test_failed_write_stays_dirty_until_retry_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join(BACKUP_DIR_NAME);
    // a regular file where the backup directory belongs
    fs::write(&blocker, "not a directory").unwrap();

    let storage = open(&temp_dir, config(2, 60_000, 600_000));
    storage.put("k", "v".to_string());

    assert!(matches!(storage.flush(), Err(StoreError::Write(_))));
    assert!(storage.is_dirty());

    fs::remove_file(&blocker).unwrap();
    assert!(storage.flush().unwrap());
    assert!(!storage.is_dirty());
    assert_eq!(backup_count(&storage), 1);
}
