//! Error types for key issuance runs.

use detkey_chain::{AuthorityError, PostRecord, PublishError};
use detkey_core::{KeyGenerationError, KeyId, KeyType, SigningError, SplitError};
use thiserror::Error;

/// Errors that can occur during a run or a re-derivation.
///
/// Stage errors carry the key type they were issuing, so a failure on the
/// signing key is distinguishable from one on the exchange key.
#[derive(Debug, Error)]
pub enum DetKeyError {
    /// Server half generation failed.
    #[error("{key_type}: split failed: {source}")]
    Split {
        key_type: KeyType,
        #[source]
        source: SplitError,
    },

    /// Key derivation failed.
    #[error("{key_type}: key generation failed: {source}")]
    KeyGeneration {
        key_type: KeyType,
        #[source]
        source: KeyGenerationError,
    },

    /// Signing the chain link failed.
    #[error("{key_type}: signing failed: {source}")]
    Signing {
        key_type: KeyType,
        #[source]
        source: SigningError,
    },

    /// Publishing the chain link failed. `record` can be published again.
    #[error("{key_type}: publish failed: {source}")]
    Publish {
        key_type: KeyType,
        record: Box<PostRecord>,
        #[source]
        source: PublishError,
    },

    /// The local secret could not be unlocked.
    #[error("unlock failed: {0}")]
    Unlock(#[source] AuthorityError),

    /// Authority error outside a publish.
    #[error("authority error: {0}")]
    Authority(#[from] AuthorityError),

    /// Sealing or opening a private key failed.
    #[error("seal error: {0}")]
    Seal(String),

    /// The authority holds no server half for the key.
    #[error("no server half stored for {0}")]
    ServerHalfMissing(KeyId),

    /// Re-derivation produced a different key than the one recorded.
    #[error("derived key {got} does not match expected {expected}")]
    KeyMismatch { expected: KeyId, got: KeyId },
}

impl DetKeyError {
    /// The key type whose stage failed, if the error came from a stage.
    pub fn key_type(&self) -> Option<KeyType> {
        match self {
            DetKeyError::Split { key_type, .. }
            | DetKeyError::KeyGeneration { key_type, .. }
            | DetKeyError::Signing { key_type, .. }
            | DetKeyError::Publish { key_type, .. } => Some(*key_type),
            _ => None,
        }
    }

    /// The record to publish again, if the run stopped at a retryable publish.
    pub fn retry_record(&self) -> Option<&PostRecord> {
        match self {
            DetKeyError::Publish { record, source, .. } if source.is_retryable() => Some(record),
            _ => None,
        }
    }
}

/// Result type for issuance operations.
pub type Result<T> = std::result::Result<T, DetKeyError>;
