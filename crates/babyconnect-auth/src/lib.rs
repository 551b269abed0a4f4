//! # babyconnect-auth
//!
//! Local account registration and session management for BabyConnect.
//!
//! Used when no remote backend is configured; in hybrid mode the backend's
//! own auth endpoints take over (see `babyconnect-sync`).
//!
//! - [`SessionManager`] registers accounts, logs in, and issues time-bounded
//!   session tokens stored in the record store.
//! - [`password`] holds the salted PBKDF2 digest scheme and the legacy
//!   unsalted SHA-256 fallback.

pub mod error;
pub mod password;
pub mod session;

pub use error::{AuthError, AuthResult};
pub use session::{DEFAULT_SESSION_TTL_HOURS, SessionManager};
