//! Schema migration system.
//!
//! Migrations are an ordered list of named steps keyed by version number.
//! The last applied version is stamped under [`keys::DATA_VERSION`]; at
//! startup every step newer than the stamp runs in order and the stamp is
//! advanced after each one.
//!
//! Every step is additive: it writes a key only when that key is absent
//! (Config is the one exception, and it only *adds* missing fields). A
//! version mismatch therefore never loses user data, and re-running a step
//! is a no-op.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::models::{AppConfig, MarketplaceProduct, Post, UserAccount, UserSettings};
use crate::record::RecordStore;
use crate::seed;

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Short machine name, used in logs and errors.
    name: &'static str,
    /// Human-readable description.
    description: &'static str,
    apply: fn(&RecordStore) -> StoreResult<()>,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "seed_collections",
        description: "seed catalogs and user settings when absent",
        apply: seed_collections,
    },
    Migration {
        version: 2,
        name: "merge_config",
        description: "merge newly introduced config fields into the stored config",
        apply: merge_config,
    },
    Migration {
        version: 3,
        name: "seed_social_collections",
        description: "seed marketplace, posts and local accounts when absent",
        apply: seed_social_collections,
    },
];

/// What a call to [`run_all`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<&'static str>,
}

// ── public API ───────────────────────────────────────────────────────

/// Version the compiled binary expects the store to be at.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Stored version stamp; missing or non-numeric stamps (such as the
/// free-form markers of early releases) count as 0.
pub fn current_version(store: &RecordStore) -> u32 {
    let Some(raw) = store.raw(keys::DATA_VERSION) else {
        return 0;
    };
    // The stamp is written as a JSON string, but accept a bare number too.
    let text = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or(raw);
    match text.trim().parse() {
        Ok(version) => version,
        Err(_) => {
            debug!(stamp = %text, "unrecognized version stamp, treating as 0");
            0
        }
    }
}

/// Run all pending migrations against `store`.
pub fn run_all(store: &RecordStore) -> StoreResult<MigrationReport> {
    let current = current_version(store);
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "store schema is up to date");
        return Ok(MigrationReport {
            from: current,
            to: current,
            applied: Vec::new(),
        });
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    let mut applied = Vec::with_capacity(pending.len());
    for migration in pending {
        apply(store, migration)?;
        applied.push(migration.name);
    }

    let to = latest_version();
    info!(new_version = to, "all migrations applied");
    Ok(MigrationReport {
        from: current,
        to,
        applied,
    })
}

// ── internals ────────────────────────────────────────────────────────

fn apply(store: &RecordStore, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        name = migration.name,
        description = migration.description,
        "applying migration"
    );

    (migration.apply)(store).map_err(|e| {
        warn!(version = migration.version, error = %e, "migration failed");
        StoreError::Migration {
            version: migration.version,
            name: migration.name,
            message: e.to_string(),
        }
    })?;

    store
        .write(keys::DATA_VERSION, &migration.version.to_string())
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            name: migration.name,
            message: format!("failed to stamp version: {e}"),
        })
}

/// Write `value` under `key` only if nothing is stored there.
fn seed_if_absent<T: serde::Serialize>(
    store: &RecordStore,
    key: &str,
    value: impl FnOnce() -> T,
) -> StoreResult<()> {
    if store.contains(key) || !store.insert_if_absent(key, &value())? {
        debug!(key, "key present, leaving untouched");
        return Ok(());
    }
    debug!(key, "seeded absent key");
    Ok(())
}

fn seed_collections(store: &RecordStore) -> StoreResult<()> {
    seed_if_absent(store, keys::PRODUCTS, seed::products)?;
    seed_if_absent(store, keys::CHECKLIST_DEF, seed::checklist)?;
    seed_if_absent(store, keys::WEEKS, seed::weeks)?;
    seed_if_absent(store, keys::USER_SETTINGS, UserSettings::default)?;
    Ok(())
}

/// Overlay the stored config on the defaults. Existing fields keep their
/// values; fields the stored object lacks are added. Anything that is not a
/// JSON object is left alone.
fn merge_config(store: &RecordStore) -> StoreResult<()> {
    let Some(raw) = store.raw(keys::CONFIG) else {
        if !store.insert_if_absent(keys::CONFIG, &AppConfig::default())? {
            debug!("config appeared during migration, leaving it");
        }
        return Ok(());
    };

    let Ok(Value::Object(stored)) = serde_json::from_str::<Value>(&raw) else {
        warn!("stored config is not a JSON object, skipping merge");
        return Ok(());
    };

    let Value::Object(mut merged) = serde_json::to_value(AppConfig::default())? else {
        return Ok(());
    };
    let defaults = merged.len();
    let added = merged.keys().filter(|k| !stored.contains_key(*k)).count();
    if added == 0 {
        return Ok(());
    }

    merged.extend(stored);
    debug!(added, defaults, "config merged with new defaults");
    let merged = serde_json::to_string(&Value::Object(merged))?;
    if !store.swap_raw(keys::CONFIG, Some(raw.as_str()), &merged)? {
        warn!("config changed during merge, keeping the newer value");
    }
    Ok(())
}

fn seed_social_collections(store: &RecordStore) -> StoreResult<()> {
    seed_if_absent(store, keys::MARKETPLACE, Vec::<MarketplaceProduct>::new)?;
    seed_if_absent(store, keys::POSTS, Vec::<Post>::new)?;
    seed_if_absent(store, keys::USERS, Vec::<UserAccount>::new)?;
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
