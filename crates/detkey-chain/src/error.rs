//! Error types for authority calls and key publication.

use std::time::Duration;

use detkey_core::CoreError;
use thiserror::Error;

/// Errors reported by an [`Authority`](crate::Authority).
#[derive(Debug, Clone, Error)]
pub enum AuthorityError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("stale chain head: expected seqno {expected}, got {got}")]
    StaleHead { expected: u64, got: u64 },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors from publishing a chain link.
///
/// A failed publish is safe to retry with the same
/// [`PostRecord`](crate::PostRecord): the signature id is unchanged, so the
/// authority and the local head both treat a repeat as a no-op.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("stale chain head: expected seqno {expected}, got {got}")]
    StaleHead { expected: u64, got: u64 },

    #[error("rejected by authority: {0}")]
    Rejected(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed record: {0}")]
    Malformed(#[from] CoreError),
}

impl PublishError {
    /// Whether retrying the same record could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Network(_) | PublishError::Timeout(_))
    }
}

impl From<AuthorityError> for PublishError {
    fn from(e: AuthorityError) -> Self {
        match e {
            AuthorityError::Network(msg) => PublishError::Network(msg),
            AuthorityError::Unauthorized(msg) => PublishError::Unauthorized(msg),
            AuthorityError::StaleHead { expected, got } => PublishError::StaleHead { expected, got },
            AuthorityError::Rejected(msg) | AuthorityError::NotFound(msg) => {
                PublishError::Rejected(msg)
            }
        }
    }
}

/// Result type for authority calls.
pub type Result<T> = std::result::Result<T, AuthorityError>;
