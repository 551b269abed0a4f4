//! Whole-store export and import.
//!
//! A backup is a flat JSON object mapping each namespaced key to the raw
//! string stored under it:
//!
//! ```json
//! { "bc_config": "{\"appName\":\"BabyConnect\"}", "bc_weeks": "[...]" }
//! ```
//!
//! There is no version field; after a restore the migrator reconciles the
//! imported records. Import only ever touches keys carrying the `bc_`
//! prefix, and validates the whole document before the first write.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::keys;
use crate::record::RecordStore;

/// Why a backup could not be imported or exported.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The document is not a JSON object.
    #[error("backup is not a valid JSON object: {0}")]
    Malformed(String),

    /// The document parsed but carries no recognised key.
    #[error("backup contains no recognised keys")]
    NoRecognizedKeys,

    /// Reading or writing the backup file failed.
    #[error("backup file error: {0}")]
    Io(#[from] std::io::Error),

    /// The store rejected a write; earlier writes were rolled back.
    #[error("restore failed: {0}")]
    Store(#[from] StoreError),
}

/// Serialize every known key that currently has a value.
pub fn create_backup(store: &RecordStore) -> String {
    let mut map = Map::new();
    for key in keys::ALL {
        if let Some(raw) = store.raw(key) {
            map.insert((*key).to_string(), Value::String(raw));
        }
    }
    Value::Object(map).to_string()
}

/// Import a backup, returning `true` on success. See [`try_restore_backup`].
pub fn restore_backup(store: &RecordStore, blob: &str) -> bool {
    match try_restore_backup(store, blob) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "backup restore failed");
            false
        }
    }
}

/// Import a backup, returning how many keys were written.
///
/// Properties outside the `bc_` namespace, or whose value is not a string,
/// are skipped. Nothing is written unless the document parses and carries
/// at least one recognised key. If a write fails part-way, keys already
/// written are put back to their previous state.
#[instrument(skip(store, blob), fields(bytes = blob.len()))]
pub fn try_restore_backup(store: &RecordStore, blob: &str) -> Result<usize, BackupError> {
    let parsed: Value =
        serde_json::from_str(blob).map_err(|e| BackupError::Malformed(e.to_string()))?;
    let Value::Object(map) = parsed else {
        return Err(BackupError::Malformed("top level is not an object".into()));
    };

    let recognized: Vec<(String, String)> = map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(raw) if keys::is_namespaced(&key) => Some((key, raw)),
            _ => {
                warn!(key, "skipping unrecognised backup entry");
                None
            }
        })
        .collect();
    if recognized.is_empty() {
        return Err(BackupError::NoRecognizedKeys);
    }

    let mut previous: Vec<(&str, Option<String>)> = Vec::with_capacity(recognized.len());
    for (key, raw) in &recognized {
        let before = store.raw(key);
        if let Err(e) = store.write_raw(key, raw) {
            rollback(store, &previous);
            return Err(e.into());
        }
        previous.push((key.as_str(), before));
    }

    info!(keys = recognized.len(), "backup restored");
    Ok(recognized.len())
}

fn rollback(store: &RecordStore, previous: &[(&str, Option<String>)]) {
    for (key, before) in previous.iter().rev() {
        let result = match before {
            Some(raw) => store.write_raw(key, raw),
            None => store.remove(key).map(|_| ()),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "rollback write failed");
        }
    }
}

/// Write [`create_backup`] output to `path`.
pub fn export_to_file(store: &RecordStore, path: &Path) -> Result<(), BackupError> {
    fs::write(path, create_backup(store))?;
    info!(path = %path.display(), "backup exported");
    Ok(())
}

/// Read `path` and restore it.
pub fn import_from_file(store: &RecordStore, path: &Path) -> Result<usize, BackupError> {
    let blob = fs::read_to_string(path)?;
    try_restore_backup(store, &blob)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration;
    use crate::models::{AuthSession, Comment, MarketplaceProduct, Post, UserAccount, UserSettings};

    fn post() -> Post {
        Post {
            id: "p1".into(),
            author_name: "Ana".into(),
            author_week: 24,
            author_photo: None,
            owner_id: Some("ana".into()),
            content: "Primeiro chute hoje!".into(),
            image: Some("https://cdn.test/posts/p1.jpg".into()),
            likes: 2,
            liked_by_me: true,
            comments: vec![Comment {
                id: "c1".into(),
                author_name: "Bia".into(),
                text: "Que lindo".into(),
                timestamp: 1_792_000_100_000,
                is_dev: false,
            }],
            timestamp: 1_792_000_000_000,
        }
    }

    fn account() -> UserAccount {
        UserAccount {
            id: "u1".into(),
            username: "Ana".into(),
            password_hash: "pbkdf2$1000$c2FsdA$aGFzaA".into(),
            created_at: 1_791_000_000_000,
        }
    }

    fn listing() -> MarketplaceProduct {
        MarketplaceProduct {
            id: "m1".into(),
            name: "Carrinho".into(),
            description: "Pouco usado".into(),
            price: "R$ 350".into(),
            image: String::new(),
            owner_id: "ana".into(),
            owner_name: "Ana".into(),
            owner_phone: "11999990000".into(),
            city: "Campinas".into(),
            state: "SP".into(),
            created_at: 1_791_500_000_000,
        }
    }

    fn session() -> AuthSession {
        AuthSession {
            username: "Ana".into(),
            token: "tok".into(),
            expires_at: 1_792_600_000_000,
        }
    }

    fn populated() -> RecordStore {
        let store = RecordStore::in_memory();
        migration::run_all(&store).unwrap();
        let settings = UserSettings {
            due_date: Some("2027-01-10".into()),
            checklist_progress: vec!["c2".into()],
            ..Default::default()
        };
        store.write(keys::USER_SETTINGS, &settings).unwrap();
        store
            .write_raw(keys::AI_USAGE, r#"{"date":"2026-10-18","count":2}"#)
            .unwrap();
        store.write(keys::POSTS, &vec![post()]).unwrap();
        store.write(keys::USERS, &vec![account()]).unwrap();
        store.write(keys::MARKETPLACE, &vec![listing()]).unwrap();
        store.write(keys::AUTH_SESSION, &session()).unwrap();
        store
    }

    #[test]
    fn backup_round_trip_restores_every_key() {
        let source = populated();
        let blob = create_backup(&source);

        let target = RecordStore::in_memory();
        assert!(restore_backup(&target, &blob));
        for key in keys::ALL {
            assert!(source.contains(key), "fixture leaves {key} empty");
            assert_eq!(target.raw(key), source.raw(key), "key {key}");
        }

        assert_eq!(target.try_read::<Vec<Post>>(keys::POSTS), Some(vec![post()]));
        assert_eq!(target.try_read::<Vec<UserAccount>>(keys::USERS), Some(vec![account()]));
        assert_eq!(
            target.try_read::<Vec<MarketplaceProduct>>(keys::MARKETPLACE),
            Some(vec![listing()])
        );
        assert_eq!(target.try_read::<AuthSession>(keys::AUTH_SESSION), Some(session()));
    }

    #[test]
    fn backup_omits_absent_keys() {
        let store = RecordStore::in_memory();
        store.write_raw(keys::CONFIG, "{}").unwrap();
        let parsed: Value = serde_json::from_str(&create_backup(&store)).unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["bc_config"], "{}");
    }

    #[test]
    fn partial_backup_only_touches_recognised_keys() {
        let store = populated();
        let weeks_before = store.raw(keys::WEEKS);

        let blob = r#"{"bc_config":"{\"appName\":\"X\"}","foreign_key":"boom","bc_posts":42}"#;
        assert_eq!(try_restore_backup(&store, blob).unwrap(), 1);

        assert_eq!(store.raw(keys::CONFIG).as_deref(), Some(r#"{"appName":"X"}"#));
        assert_eq!(store.raw(keys::WEEKS), weeks_before);
        assert!(!store.contains("foreign_key"));
        assert_ne!(store.raw(keys::POSTS).as_deref(), Some("42"));
    }

    #[test]
    fn malformed_backup_writes_nothing() {
        let store = populated();
        let before = create_backup(&store);

        assert!(!restore_backup(&store, "{not json"));
        assert!(matches!(
            try_restore_backup(&store, "[1,2]"),
            Err(BackupError::Malformed(_))
        ));
        assert!(matches!(
            try_restore_backup(&store, r#"{"other":"x"}"#),
            Err(BackupError::NoRecognizedKeys)
        ));
        assert!(matches!(
            try_restore_backup(&store, r#"{"bc_":"x"}"#),
            Err(BackupError::NoRecognizedKeys)
        ));
        assert_eq!(create_backup(&store), before);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let source = populated();
        export_to_file(&source, &path).unwrap();

        let target = RecordStore::in_memory();
        let written = import_from_file(&target, &path).unwrap();
        assert_eq!(written, keys::ALL.iter().filter(|k| source.contains(k)).count());

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            import_from_file(&target, &missing),
            Err(BackupError::Io(_))
        ));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            BackupError::NoRecognizedKeys.to_string(),
            "backup contains no recognised keys"
        );
    }
}
