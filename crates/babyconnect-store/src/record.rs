//! Typed record access over a [`StorageMedium`].
//!
//! [`RecordStore`] is the only component that talks to the medium. It
//! serializes values as JSON, substitutes defaults for missing or corrupt
//! records, and fans out a [`ChangeEvent`] to every subscriber after each
//! successful write.
//!
//! Reads never fail: a record that cannot be parsed (or a medium that cannot
//! be read) is logged and replaced by the caller-supplied default. Writes
//! return [`StoreResult`] because a durable medium can reject them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::medium::StorageMedium;

/// How many times [`RecordStore::update`] retries a lost compare-and-swap.
const MAX_UPDATE_ATTEMPTS: u32 = 64;

// ── change notification ──────────────────────────────────────────────

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Written,
    Removed,
}

/// Broadcast to subscribers after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub kind: ChangeKind,
}

/// Handle returned by [`RecordStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

// ── store ────────────────────────────────────────────────────────────

/// Cheaply cloneable handle to the record store. Clones share the medium and
/// the subscriber list.
#[derive(Clone)]
pub struct RecordStore {
    medium: Arc<dyn StorageMedium>,
    observers: Arc<Mutex<Observers>>,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("subscribers", &self.observers().listeners.len())
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Wrap a medium.
    pub fn new(medium: impl StorageMedium + 'static) -> Self {
        Self::from_arc(Arc::new(medium))
    }

    /// Wrap an already shared medium.
    pub fn from_arc(medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            medium,
            observers: Arc::new(Mutex::new(Observers::default())),
        }
    }

    /// Store over a fresh in-memory medium.
    pub fn in_memory() -> Self {
        Self::new(crate::medium::MemoryMedium::new())
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Parse the record under `key`, or return `default()` when it is absent
    /// or unparseable.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: impl FnOnce() -> T) -> T {
        self.try_read(key).unwrap_or_else(default)
    }

    /// Like [`read`](Self::read), but persists the default when the key is
    /// absent. Corrupt records are *not* overwritten here.
    pub fn read_or_init<T>(&self, key: &str, default: impl FnOnce() -> T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(value) = self.try_read(key) {
            return value;
        }
        let value = default();
        match self.insert_if_absent(key, &value) {
            Ok(true) => value,
            // Someone else wrote the key after our read; theirs wins.
            Ok(false) => self.try_read(key).unwrap_or(value),
            Err(e) => {
                warn!(key, error = %e, "failed to persist default record");
                value
            }
        }
    }

    /// Parse the record under `key`; `None` when absent or corrupt.
    pub fn try_read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "corrupt record, falling back to default");
                None
            }
        }
    }

    /// The raw serialized string under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        match self.medium.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    /// Whether anything is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Serialize and persist `value`, then notify subscribers.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.write_raw(key, &raw)
    }

    /// Persist an already serialized value verbatim.
    pub fn write_raw(&self, key: &str, raw: &str) -> StoreResult<()> {
        self.medium.set(key, raw)?;
        debug!(key, bytes = raw.len(), "record written");
        self.notify(key, ChangeKind::Written);
        Ok(())
    }

    /// Persist `value` only if nothing is stored under `key`. Returns `false`
    /// (and writes nothing) when the key is already taken, even by a record
    /// written between the caller's read and this call.
    pub fn insert_if_absent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<bool> {
        let raw = serde_json::to_string(value)?;
        self.swap_raw(key, None, &raw)
    }

    /// Replace the raw value under `key` with `new` if it still equals
    /// `expected` (`None` meaning absent). Subscribers are notified on success.
    pub fn swap_raw(&self, key: &str, expected: Option<&str>, new: &str) -> StoreResult<bool> {
        if !self.medium.compare_and_swap(key, expected, new)? {
            debug!(key, "record changed underneath, not written");
            return Ok(false);
        }
        debug!(key, bytes = new.len(), "record written");
        self.notify(key, ChangeKind::Written);
        Ok(true)
    }

    /// Delete `key`, returning `true` if it existed.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let existed = self.medium.remove(key)?;
        if existed {
            debug!(key, "record removed");
            self.notify(key, ChangeKind::Removed);
        }
        Ok(existed)
    }

    /// Atomic read-modify-write.
    ///
    /// `f` receives the current value (or `default()` when absent/corrupt)
    /// and returns whether it changed anything. Unchanged values are returned
    /// without a write. The write is a compare-and-swap against the raw value
    /// that was read, retried when another writer got there first.
    pub fn update<T, F>(&self, key: &str, default: impl Fn() -> T, mut f: F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> bool,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let raw = self.medium.get(key)?;
            let mut value = raw
                .as_deref()
                .and_then(|r| serde_json::from_str(r).ok())
                .unwrap_or_else(&default);

            if !f(&mut value) {
                return Ok(value);
            }

            let next = serde_json::to_string(&value)?;
            if self.medium.compare_and_swap(key, raw.as_deref(), &next)? {
                debug!(key, attempt, "record updated");
                self.notify(key, ChangeKind::Written);
                return Ok(value);
            }
            debug!(key, attempt, "compare-and-swap lost, retrying");
            std::thread::yield_now();
        }

        Err(StoreError::Contention {
            key: key.to_string(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    // ── subscribers ──────────────────────────────────────────────────

    /// Register a listener called synchronously after every successful
    /// write or removal. Listeners registered later do not see past events.
    pub fn subscribe(&self, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let mut observers = self.observers();
        observers.next_id += 1;
        let id = observers.next_id;
        observers.listeners.push((id, Arc::new(listener)));
        Subscription(id)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut observers = self.observers();
        let before = observers.listeners.len();
        observers.listeners.retain(|(id, _)| *id != subscription.0);
        observers.listeners.len() != before
    }

    fn notify(&self, key: &str, kind: ChangeKind) {
        // Snapshot so listeners may write or (un)subscribe without deadlocking.
        let listeners: Vec<Listener> = self
            .observers()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let event = ChangeEvent {
            key: key.to_string(),
            kind,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::medium::{MemoryMedium, RacingMedium};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn read_missing_returns_default() {
        let store = RecordStore::in_memory();
        let value = store.read("bc_counter", || Counter { n: 7 });
        assert_eq!(value, Counter { n: 7 });
        assert!(!store.contains("bc_counter"));
    }

    #[test]
    fn write_then_read() {
        let store = RecordStore::in_memory();
        store.write("bc_counter", &Counter { n: 3 }).unwrap();
        assert_eq!(store.read("bc_counter", || Counter { n: 0 }), Counter { n: 3 });
    }

    #[test]
    fn corrupt_record_recovers_with_default() {
        let medium = MemoryMedium::new();
        medium.set("bc_counter", "{not json").unwrap();
        let store = RecordStore::new(medium);

        assert_eq!(store.read("bc_counter", || Counter { n: 1 }), Counter { n: 1 });
        assert!(store.try_read::<Counter>("bc_counter").is_none());
        // Raw data is left alone.
        assert_eq!(store.raw("bc_counter").as_deref(), Some("{not json"));
    }

    #[test]
    fn read_or_init_persists_default_once() {
        let store = RecordStore::in_memory();
        let first = store.read_or_init("bc_counter", || Counter { n: 5 });
        assert_eq!(first, Counter { n: 5 });
        assert!(store.contains("bc_counter"));

        let second = store.read_or_init("bc_counter", || Counter { n: 99 });
        assert_eq!(second, Counter { n: 5 });
    }

    #[test]
    fn read_or_init_does_not_clobber_corrupt_record() {
        let medium = MemoryMedium::new();
        medium.set("bc_counter", "garbage").unwrap();
        let store = RecordStore::new(medium);

        let value = store.read_or_init("bc_counter", || Counter { n: 2 });
        assert_eq!(value, Counter { n: 2 });
        assert_eq!(store.raw("bc_counter").as_deref(), Some("garbage"));
    }

    #[test]
    fn read_or_init_keeps_record_written_after_absent_read() {
        let store = RecordStore::new(RacingMedium::new("bc_counter", r#"{"n":41}"#));
        let events = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&events);
        store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let value = store.read_or_init("bc_counter", || Counter { n: 0 });
        assert_eq!(value, Counter { n: 41 });
        assert_eq!(store.raw("bc_counter").as_deref(), Some(r#"{"n":41}"#));
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let store = RecordStore::in_memory();
        assert!(store.insert_if_absent("bc_counter", &Counter { n: 1 }).unwrap());
        assert!(!store.insert_if_absent("bc_counter", &Counter { n: 2 }).unwrap());
        assert_eq!(store.read("bc_counter", || Counter { n: 0 }).n, 1);
    }

    #[test]
    fn update_applies_and_skips_unchanged() {
        let store = RecordStore::in_memory();
        let v = store
            .update("bc_counter", || Counter { n: 0 }, |c| {
                c.n += 1;
                true
            })
            .unwrap();
        assert_eq!(v.n, 1);

        let v = store
            .update("bc_counter", || Counter { n: 0 }, |_| false)
            .unwrap();
        assert_eq!(v.n, 1);
        assert_eq!(store.read("bc_counter", || Counter { n: 0 }).n, 1);
    }

    #[test]
    fn update_is_atomic_across_threads() {
        let store = RecordStore::in_memory();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store
                            .update("bc_counter", || Counter { n: 0 }, |c| {
                                c.n += 1;
                                true
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.read("bc_counter", || Counter { n: 0 }).n, 200);
    }

    #[test]
    fn subscribers_see_writes_and_removals() {
        let store = RecordStore::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        store.write("bc_config", &Counter { n: 1 }).unwrap();
        store.remove("bc_config").unwrap();
        // Removing an absent key is not an event.
        store.remove("bc_config").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ChangeKind::Written);
        assert_eq!(seen[1].kind, ChangeKind::Removed);
        assert_eq!(seen[1].key, "bc_config");
    }

    #[test]
    fn late_subscriber_gets_no_replay_and_unsubscribe_works() {
        let store = RecordStore::in_memory();
        store.write("bc_config", &Counter { n: 1 }).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        store.write("bc_config", &Counter { n: 2 }).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.write("bc_config", &Counter { n: 3 }).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_write_without_deadlock() {
        let store = RecordStore::in_memory();
        let inner = store.clone();
        store.subscribe(move |event| {
            if event.key == "bc_a" {
                inner.write("bc_b", &Counter { n: 1 }).unwrap();
            }
        });
        store.write("bc_a", &Counter { n: 1 }).unwrap();
        assert!(store.contains("bc_b"));
    }
}
