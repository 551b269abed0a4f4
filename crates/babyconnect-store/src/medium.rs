//! Flat string-keyed storage mediums.
//!
//! A [`StorageMedium`] is the only thing that touches bytes on disk (or in
//! memory). Everything above it goes through [`RecordStore`](crate::RecordStore).
//!
//! Two implementations are provided:
//!
//! - [`MemoryMedium`]: a `HashMap` behind a mutex, for tests and throwaway runs.
//! - [`SqliteMedium`]: a single `kv` table in SQLite (WAL mode), the durable
//!   medium used by the CLI. Compare-and-swap is a single conditional
//!   statement, so it stays atomic when several processes share the file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Synchronous key → string storage.
pub trait StorageMedium: Send + Sync {
    /// Fetch the raw value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite `key`.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`, returning `true` if it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Atomically replace the value of `key` with `new` if its current value
    /// equals `expected` (`None` meaning "absent").
    ///
    /// Returns `false` without writing when the current value differs.
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> StoreResult<bool>;
}

// ── in-memory ────────────────────────────────────────────────────────

/// In-process medium. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryMedium {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

// ── sqlite ───────────────────────────────────────────────────────────

/// SQLite-backed medium storing every key in one `kv` table.
#[derive(Clone)]
pub struct SqliteMedium {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMedium {
    /// Open (or create) a database at `path`, apply pragmas and create the
    /// `kv` table if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening sqlite medium");

        let conn = Connection::open(path)?;
        Self::prepare(conn)
    }

    /// Create an in-memory database. Useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory sqlite medium");
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> StoreResult<Self> {
        // WAL: readers never block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Another process holding the write lock makes us wait, not fail.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl StorageMedium for SqliteMedium {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
        Ok(deleted > 0)
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = match expected {
            Some(old) => conn.execute(
                "UPDATE kv SET value = ?3 WHERE key = ?1 AND value = ?2",
                rusqlite::params![key, old, new],
            )?,
            None => conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
                rusqlite::params![key, new],
            )?,
        };
        Ok(changed == 1)
    }
}

// ── test support ─────────────────────────────────────────────────────

/// Memory medium with a second writer: the first read that finds `key`
/// absent returns `None`, and `value` is stored under `key` right after.
#[cfg(test)]
pub(crate) struct RacingMedium {
    pub inner: MemoryMedium,
    key: &'static str,
    value: &'static str,
    fired: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RacingMedium {
    pub fn new(key: &'static str, value: &'static str) -> Self {
        Self {
            inner: MemoryMedium::new(),
            key,
            value,
            fired: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
impl StorageMedium for RacingMedium {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        use std::sync::atomic::Ordering;

        let found = self.inner.get(key)?;
        if found.is_none() && key == self.key && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.set(key, self.value)?;
        }
        Ok(found)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key)
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> StoreResult<bool> {
        self.inner.compare_and_swap(key, expected, new)
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(medium: &dyn StorageMedium) {
        assert!(medium.get("missing").unwrap().is_none());

        medium.set("k", "v1").unwrap();
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("v1"));

        medium.set("k", "v2").unwrap();
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("v2"));

        assert!(medium.remove("k").unwrap());
        assert!(!medium.remove("k").unwrap());
        assert!(medium.get("k").unwrap().is_none());
    }

    fn exercise_cas(medium: &dyn StorageMedium) {
        // Insert-if-absent.
        assert!(medium.compare_and_swap("c", None, "1").unwrap());
        assert!(!medium.compare_and_swap("c", None, "2").unwrap());
        assert_eq!(medium.get("c").unwrap().as_deref(), Some("1"));

        // Swap on matching value only.
        assert!(!medium.compare_and_swap("c", Some("0"), "2").unwrap());
        assert!(medium.compare_and_swap("c", Some("1"), "2").unwrap());
        assert_eq!(medium.get("c").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn memory_medium_basic_ops() {
        exercise(&MemoryMedium::new());
    }

    #[test]
    fn memory_medium_cas() {
        exercise_cas(&MemoryMedium::new());
    }

    #[test]
    fn memory_medium_clones_share_state() {
        let a = MemoryMedium::new();
        let b = a.clone();
        a.set("shared", "yes").unwrap();
        assert_eq!(b.get("shared").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn sqlite_medium_basic_ops() {
        exercise(&SqliteMedium::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_medium_cas() {
        exercise_cas(&SqliteMedium::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_medium_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let medium = SqliteMedium::open(&path).unwrap();
            medium.set("bc_config", "{}").unwrap();
        }

        let reopened = SqliteMedium::open(&path).unwrap();
        assert_eq!(reopened.get("bc_config").unwrap().as_deref(), Some("{}"));
    }
}
