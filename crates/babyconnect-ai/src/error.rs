//! AI error types.
//!
//! [`MeteredGenerator`](crate::MeteredGenerator) never lets these escape:
//! they are logged and folded into [`AiOutcome::Failed`](crate::AiOutcome).
//! Direct users of a [`Generator`](crate::Generator) see them as-is.

use babyconnect_store::StoreError;

/// Alias for `Result<T, AiError>`.
pub type AiResult<T> = Result<T, AiError>;

/// Unified error type for the AI collaborator.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// No API key in config or environment.
    #[error("missing api key for the AI collaborator")]
    MissingApiKey,

    /// The HTTP request could not be sent or its body read.
    #[error("ai request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("ai service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape.
    #[error("ai response parse error: {reason}")]
    Parse { reason: String },

    /// The call did not finish within the policy timeout.
    #[error("ai call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Recording quota usage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            AiError::MissingApiKey.to_string(),
            "missing api key for the AI collaborator"
        );
        assert_eq!(
            AiError::Status {
                status: 429,
                body: "slow down".into()
            }
            .to_string(),
            "ai service returned 429: slow down"
        );
        assert_eq!(
            AiError::Timeout { seconds: 30 }.to_string(),
            "ai call timed out after 30s"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AiError>();
    }
}
