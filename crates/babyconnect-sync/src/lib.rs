//! # babyconnect-sync
//!
//! Local-first synchronization for BabyConnect.
//!
//! [`SyncCoordinator`] sits between callers and the record store. With no
//! remote configured it is a thin pass-through. With one, private
//! collections are written locally and mirrored in the background, while
//! the shared social feed is served exclusively by the remote.
//!
//! ```text
//!            ┌────────────────────┐
//!   caller ─▶│  SyncCoordinator   │
//!            └──┬──────────────┬──┘
//!     private   │              │  shared posts (hybrid)
//!  (write-thru) ▼              ▼
//!        RecordStore     dyn RemoteBackend ── RestBackend (reqwest)
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod remote;
pub mod rest;

pub use config::{DEFAULT_TIMEOUT, RemoteConfig, SyncPolicy};
pub use coordinator::{PostDraft, SyncCoordinator, SyncMode};
pub use error::{SyncError, SyncResult};
pub use remote::{RemoteBackend, RemoteSession};
pub use rest::RestBackend;
