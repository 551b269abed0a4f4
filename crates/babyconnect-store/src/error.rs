//! Error types for the babyconnect-store crate.
//!
//! All fallible storage operations return [`StoreError`] via [`StoreResult`].
//! Reads through [`RecordStore::read`](crate::RecordStore::read) never
//! surface these: a corrupt or unreadable record is replaced by its default.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema migration step failed.
    #[error("migration v{version} ({name}) failed: {message}")]
    Migration {
        version: u32,
        name: &'static str,
        message: String,
    },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the record it tried to mutate.
    #[error("{entity} {id} is not owned by {owner}")]
    NotOwner {
        entity: &'static str,
        id: String,
        owner: String,
    },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A read-modify-write lost the race too many times.
    #[error("contention on key {key} after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    /// The storage medium lock was poisoned by a panicking writer.
    #[error("storage medium poisoned: {0}")]
    Poisoned(String),
}
