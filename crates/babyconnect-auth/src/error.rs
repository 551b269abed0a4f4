//! Error types for the auth crate.
//!
//! Every operation surfaces failures through [`AuthError`]. Credential
//! problems are ordinary variants the caller is expected to match on; only
//! [`AuthError::Store`] and [`AuthError::Crypto`] indicate a fault.

use babyconnect_store::StoreError;

/// Alias for `Result<T, AuthError>`.
pub type AuthResult<T> = Result<T, AuthError>;

/// Unified error type for account and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An account with this username (compared case-insensitively) exists.
    #[error("username already taken: {username}")]
    DuplicateUsername {
        /// The username that was requested.
        username: String,
    },

    /// No account matches the username.
    #[error("user not found: {username}")]
    UserNotFound {
        /// The username that was looked up.
        username: String,
    },

    /// The password does not match the stored digest.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A required field was empty or malformed.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What is wrong with the input.
        reason: String,
    },

    /// The system random source or a stored digest could not be used.
    #[error("crypto error: {reason}")]
    Crypto {
        /// Details about the failure.
        reason: String,
    },

    /// An error propagated from the record store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = AuthError::DuplicateUsername {
            username: "Ana".into(),
        };
        assert_eq!(err.to_string(), "username already taken: Ana");

        let err = AuthError::UserNotFound {
            username: "bia".into(),
        };
        assert_eq!(err.to_string(), "user not found: bia");

        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");

        let err = AuthError::InvalidInput {
            reason: "password is empty".into(),
        };
        assert_eq!(err.to_string(), "invalid input: password is empty");
    }

    #[test]
    fn store_errors_convert() {
        let err: AuthError = StoreError::InvalidArgument("x".into()).into();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
