//! Sync error types.
//!
//! Remote faults ([`SyncError::is_remote_failure`]) degrade functionality:
//! private writes still land locally and shared reads come back empty. The
//! remaining variants are answers the caller must act on.

use babyconnect_store::StoreError;

/// Alias for `Result<T, SyncError>`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Unified error type for the sync layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote backend could not be reached or rejected the request.
    #[error("remote unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// The remote answered with a non-success status.
    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// A remote call did not finish within the policy timeout.
    #[error("remote call `{operation}` timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// The operation needs a remote backend but none is configured.
    #[error("remote backend not configured")]
    NotConfigured,

    /// The operation needs a signed-in remote session.
    #[error("not signed in to the remote backend")]
    NotSignedIn,

    /// The caller does not own the record.
    #[error("{entity} {id} is not owned by {identity}")]
    NotOwner {
        entity: &'static str,
        id: String,
        identity: String,
    },

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input failed validation before anything was sent or written.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// An HTTP request could not be sent or its body read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote payload did not have the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error propagated from the record store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether this is a reachability or transport problem with the remote,
    /// as opposed to a local fault or an answer about the request itself.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. }
                | Self::RemoteStatus { .. }
                | Self::Timeout { .. }
                | Self::Http(_)
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = SyncError::Timeout {
            operation: "fetch_posts",
            seconds: 15,
        };
        assert_eq!(err.to_string(), "remote call `fetch_posts` timed out after 15s");

        let err = SyncError::NotOwner {
            entity: "post",
            id: "p1".into(),
            identity: "u2".into(),
        };
        assert_eq!(err.to_string(), "post p1 is not owned by u2");

        let err = SyncError::RemoteStatus {
            status: 503,
            body: "down".into(),
        };
        assert_eq!(err.to_string(), "remote returned 503: down");
    }

    #[test]
    fn remote_failures_are_classified() {
        assert!(
            SyncError::RemoteUnavailable {
                reason: "dns".into()
            }
            .is_remote_failure()
        );
        assert!(
            SyncError::Timeout {
                operation: "x",
                seconds: 1
            }
            .is_remote_failure()
        );
        assert!(!SyncError::NotConfigured.is_remote_failure());
        assert!(
            !SyncError::NotOwner {
                entity: "post",
                id: "p".into(),
                identity: "u".into()
            }
            .is_remote_failure()
        );
        assert!(!SyncError::Store(StoreError::InvalidArgument("x".into())).is_remote_failure());
    }
}
