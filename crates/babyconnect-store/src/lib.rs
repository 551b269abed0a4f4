//! # babyconnect-store
//!
//! Local-first record store for BabyConnect.
//!
//! Every collection lives under a `bc_`-prefixed key in a string key/value
//! medium (SQLite on disk, or memory in tests) as a JSON document. On top of
//! that sit versioned migrations, the daily AI quota and whole-store
//! backups.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  CatalogStore / MarketplaceStore / Settings  │
//! │  QuotaMeter (CAS, per calendar day)          │
//! │  Backup (validated, namespaced import)       │
//! ├──────────────────────────────────────────────┤
//! │  RecordStore (typed JSON, defaults, events)  │
//! │  Migrations (ordered, named, idempotent)     │
//! ├──────────────────────────────────────────────┤
//! │  StorageMedium (SQLite WAL | memory)         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use babyconnect_store::{RecordStore, SqliteMedium, migration};
//!
//! let store = RecordStore::new(SqliteMedium::open("babyconnect.db")?);
//! migration::run_all(&store)?;
//! ```

pub mod backup;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod keys;
pub mod medium;
pub mod migration;
pub mod models;
pub mod quota;
pub mod record;
pub mod seed;
pub mod settings;

// ── re-exports ───────────────────────────────────────────────────────

pub use backup::{
    BackupError, create_backup, export_to_file, import_from_file, restore_backup,
    try_restore_backup,
};
pub use catalog::{CatalogStore, MarketplaceStore, NewListing};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use medium::{MemoryMedium, SqliteMedium, StorageMedium};
pub use migration::MigrationReport;
pub use quota::{DEFAULT_DAILY_LIMIT, QuotaMeter, QuotaStatus};
pub use record::{ChangeEvent, ChangeKind, RecordStore, Subscription};
pub use settings::{ProfileUpdate, SettingsStore};
