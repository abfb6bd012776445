//! Error types for the detkey core.

use thiserror::Error;

use crate::crypto::KeyId;

/// Errors raised while encoding, decoding or verifying chain statements.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("unsupported statement version: {0}")]
    UnsupportedVersion(u8),

    #[error("malformed statement: {0}")]
    MalformedStatement(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Errors from combining a seed with a server half.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("random source failed: {0}")]
    RandomSource(String),

    #[error("length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Errors from deterministic key generation.
#[derive(Debug, Error)]
pub enum KeyGenerationError {
    #[error("invalid {algorithm} seed length: expected {expected} bytes, got {got}")]
    InvalidSeedLength {
        algorithm: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("key generation failed: {0}")]
    Primitive(String),
}

/// Errors from signing a chain statement.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("private key for {0} is unavailable")]
    KeyUnavailable(KeyId),

    #[error("signer {actual} does not match statement signing key {expected}")]
    KeyMismatch { expected: KeyId, actual: KeyId },

    #[error("{0} is not an unexpired signing key of the identity")]
    NotAuthorized(KeyId),

    #[error("identity already has a chain, an existing signing key is required")]
    SignerRequired,

    #[error("signing failed: {0}")]
    Primitive(String),
}
