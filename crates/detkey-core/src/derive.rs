//! Deterministic keypair generation from a derivation input.
//!
//! Both variants must be pure functions of the input bytes: re-deriving a
//! key in a later session depends on it.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::{Ed25519KeyPair, PublicKey, X25519KeyPair};
use crate::error::KeyGenerationError;
use crate::log::RunLog;
use crate::split::{DerivationInput, SEED_LEN};

/// Deterministic key generation, one method per key type.
pub trait KeyDeriver: Send + Sync {
    /// Derive the signing (sibkey) keypair.
    fn derive_signing(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<Ed25519KeyPair, KeyGenerationError>;

    /// Derive the key-exchange (subkey) keypair.
    fn derive_exchange(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<X25519KeyPair, KeyGenerationError>;
}

impl<D: KeyDeriver + ?Sized> KeyDeriver for Arc<D> {
    fn derive_signing(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<Ed25519KeyPair, KeyGenerationError> {
        (**self).derive_signing(input, log)
    }

    fn derive_exchange(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<X25519KeyPair, KeyGenerationError> {
        (**self).derive_exchange(input, log)
    }
}

/// Ed25519 seed expansion for signing, raw X25519 scalars for exchange.
///
/// `SigningKey::from_bytes` hashes the seed with SHA-512 (RFC 8032 §5.1.5)
/// and `StaticSecret::from` stores the bytes for clamping at use. Neither
/// draws randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaclDeriver;

impl KeyDeriver for NaclDeriver {
    fn derive_signing(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<Ed25519KeyPair, KeyGenerationError> {
        let seed = seed_array(input, "ed25519")?;
        let keypair = Ed25519KeyPair::from_seed(&seed);
        log.public_key(&PublicKey::Ed25519(keypair.public_key()));
        Ok(keypair)
    }

    fn derive_exchange(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<X25519KeyPair, KeyGenerationError> {
        let seed = seed_array(input, "x25519")?;
        let keypair = X25519KeyPair::from_bytes(*seed);
        log.public_key(&PublicKey::X25519(keypair.public_key()));
        Ok(keypair)
    }
}

fn seed_array(
    input: &DerivationInput,
    algorithm: &'static str,
) -> Result<Zeroizing<[u8; SEED_LEN]>, KeyGenerationError> {
    if input.len() != SEED_LEN {
        return Err(KeyGenerationError::InvalidSeedLength {
            algorithm,
            expected: SEED_LEN,
            got: input.len(),
        });
    }
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    seed.copy_from_slice(input.as_bytes());
    Ok(seed)
}
