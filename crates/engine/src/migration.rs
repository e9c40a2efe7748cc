//! Startup migration pass
//!
//! Rewrites entries of a recovered document in place. Descriptors are
//! tried in list order against each entry, so a later descriptor sees the
//! type name written by an earlier one.

use jsonvault_core::{DocumentMapper, StorageEntry, StorageMigration};
use jsonvault_durability::EntryMap;
use tracing::{debug, warn};

/// Outcome of a migration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries looked at
    pub examined: usize,
    /// Entries rewritten at least once
    pub migrated: usize,
    /// Entries a descriptor matched but could not migrate
    pub skipped: usize,
}

impl MigrationReport {
    /// Whether any entry changed
    pub fn changed(&self) -> bool {
        self.migrated > 0
    }
}

/// Apply `migrations` to every matching entry of `entries`
///
/// A failed transform leaves that entry as it was and moves on.
pub fn migrate_entries(
    entries: &mut EntryMap,
    migrations: &[Box<dyn StorageMigration>],
    mapper: &DocumentMapper,
) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (key, entry) in entries.iter_mut() {
        report.examined += 1;
        let mut changed = false;
        let mut failed = false;

        for migration in migrations {
            if entry.type_name() != migration.old_type_name() {
                continue;
            }
            match migration.migrate(mapper, entry.payload().clone()) {
                Ok(payload) => {
                    debug!(
                        target: "jsonvault::migration",
                        key = %key,
                        from = migration.old_type_name(),
                        to = migration.new_type_name(),
                        "Migrated entry"
                    );
                    *entry = StorageEntry::new(migration.new_type_name(), payload);
                    changed = true;
                }
                Err(e) => {
                    warn!(
                        target: "jsonvault::migration",
                        key = %key,
                        from = migration.old_type_name(),
                        error = %e,
                        "Entry left unmigrated"
                    );
                    failed = true;
                    break;
                }
            }
        }

        if changed {
            report.migrated += 1;
        }
        if failed {
            report.skipped += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonvault_core::TypedMigration;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Celsius {
        c: f64,
    }

    #[derive(Serialize, Deserialize)]
    struct Kelvin {
        k: f64,
    }

    #[derive(Serialize, Deserialize)]
    struct Labeled {
        label: String,
        k: f64,
    }

    fn to_kelvin() -> Box<dyn StorageMigration> {
        Box::new(
            TypedMigration::new(|t: Celsius| Kelvin { k: t.c + 273.0 })
                .with_old_type_name("temp.Celsius")
                .with_new_type_name("temp.Kelvin"),
        )
    }

    fn label() -> Box<dyn StorageMigration> {
        Box::new(
            TypedMigration::new(|t: Kelvin| Labeled {
                label: "room".to_string(),
                k: t.k,
            })
            .with_old_type_name("temp.Kelvin")
            .with_new_type_name("temp.Labeled"),
        )
    }

    fn entries() -> EntryMap {
        let mut entries = EntryMap::new();
        entries.insert("a".into(), StorageEntry::new("temp.Celsius", json!({"c": 20.0})));
        entries.insert("b".into(), StorageEntry::new("other.Type", json!(1)));
        entries.insert("c".into(), StorageEntry::new("temp.Celsius", json!("bad")));
        entries
    }

    #[test]
    fn test_matching_entries_rewritten() {
        let mut entries = entries();
        let report = migrate_entries(&mut entries, &[to_kelvin()], &DocumentMapper::new());

        assert_eq!(
            report,
            MigrationReport {
                examined: 3,
                migrated: 1,
                skipped: 1
            }
        );
        assert_eq!(entries["a"].type_name(), "temp.Kelvin");
        assert_eq!(entries["a"].payload(), &json!({"k": 293.0}));
        assert_eq!(entries["b"].type_name(), "other.Type");
        // undecodable entry kept as recorded
        assert_eq!(entries["c"].type_name(), "temp.Celsius");
        assert_eq!(entries["c"].payload(), &json!("bad"));
    }

    #[test]
    fn test_chained_in_one_pass() {
        let mut entries = entries();
        migrate_entries(&mut entries, &[to_kelvin(), label()], &DocumentMapper::new());
        assert_eq!(entries["a"].type_name(), "temp.Labeled");
        assert_eq!(entries["a"].payload(), &json!({"label": "room", "k": 293.0}));
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut entries = entries();
        let migrations = [to_kelvin()];
        migrate_entries(&mut entries, &migrations, &DocumentMapper::new());
        let second = migrate_entries(&mut entries, &migrations, &DocumentMapper::new());
        assert!(!second.changed());
        assert_eq!(entries["a"].type_name(), "temp.Kelvin");
    }
}
