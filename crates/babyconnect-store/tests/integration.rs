//! Integration tests for the babyconnect-store crate.
//!
//! These run the store against a real SQLite file (via tempfile): migration
//! on first open, reopening, quota persistence and backup between two
//! independent databases.

use std::sync::Arc;

use babyconnect_store::{
    CatalogStore, ManualClock, QuotaMeter, RecordStore, SettingsStore, SqliteMedium, create_backup,
    keys, migration, try_restore_backup,
};
use chrono::{Duration, TimeZone, Utc};

fn open(path: &std::path::Path) -> RecordStore {
    RecordStore::new(SqliteMedium::open(path).unwrap())
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 8, 30, 0).unwrap())
}

// ═══════════════════════════════════════════════════════════════════════
//  Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn fresh_database_is_migrated_and_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("bc.db"));

    let report = migration::run_all(&store).unwrap();
    assert_eq!(report.from, 0);
    assert_eq!(report.to, migration::latest_version());

    let catalog = CatalogStore::new(store.clone());
    assert_eq!(catalog.weeks().len(), 42);
    assert_eq!(catalog.checklist_definitions().len(), 6);
    for key in keys::ALL {
        if *key != keys::AUTH_SESSION && *key != keys::AI_USAGE {
            assert!(store.contains(key), "{key} should be seeded");
        }
    }
}

#[test]
fn progress_survives_reopen_and_remigration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bc.db");

    {
        let store = open(&path);
        migration::run_all(&store).unwrap();
        let settings = SettingsStore::new(store, Arc::new(clock()));
        settings.toggle_checklist_item("c4").unwrap();
        settings
            .set_due_date(chrono::NaiveDate::from_ymd_opt(2027, 2, 1))
            .unwrap();
    }

    let store = open(&path);
    let report = migration::run_all(&store).unwrap();
    assert!(report.applied.is_empty());

    let settings = SettingsStore::new(store, Arc::new(clock()));
    let current = settings.get();
    assert_eq!(current.checklist_progress, vec!["c4"]);
    assert_eq!(current.due_date.as_deref(), Some("2027-02-01"));
}

#[test]
fn quota_is_shared_across_handles_on_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bc.db");
    let clock = clock();

    let a = QuotaMeter::new(open(&path), Arc::new(clock.clone()));
    let b = QuotaMeter::new(open(&path), Arc::new(clock.clone()));

    a.increment().unwrap();
    b.increment().unwrap();
    let third = a.increment().unwrap();
    assert_eq!(third.count, 3);
    assert!(third.is_blocked);
    assert!(b.check_status().is_blocked);

    clock.advance(Duration::days(1));
    assert_eq!(b.check_status().count, 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Backup
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn backup_moves_data_between_databases() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(&dir.path().join("source.db"));
    migration::run_all(&source).unwrap();
    SettingsStore::new(source.clone(), Arc::new(clock()))
        .toggle_weekly_task("20-0")
        .unwrap();

    let target = open(&dir.path().join("target.db"));
    let written = try_restore_backup(&target, &create_backup(&source)).unwrap();
    assert!(written >= 7);

    // Migration after import is a no-op because the version came along too.
    let report = migration::run_all(&target).unwrap();
    assert!(report.applied.is_empty());
    for key in keys::ALL {
        assert_eq!(target.raw(key), source.raw(key), "key {key}");
    }
}
