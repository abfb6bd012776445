//! Local secret context: seals newly issued private keys for local storage.
//!
//! The local secret is the XOR of a client half (derived from the user's
//! credentials) and a half held by the authority. A context can be built by
//! unlocking with the client half, or directly from a secret the caller
//! already holds. Both paths give the same context.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use detkey_chain::Authority;
use detkey_core::{xor_bytes, IdentityId, KeyId};

use crate::error::{DetKeyError, Result};

const SEAL_CONTEXT: &str = "detkey-lks-v0 private key seal";

/// How a context was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Client half combined with the authority's half.
    Unlocked,
    /// Secret supplied directly by the caller.
    Loaded,
}

/// The unlocked local secret for one identity.
pub struct LocalSecretContext {
    seal_key: Zeroizing<[u8; 32]>,
    source: ContextSource,
}

impl LocalSecretContext {
    /// Unlock with the client half and the authority's stored half.
    pub async fn unlock<A: Authority + ?Sized>(
        client_half: &[u8; 32],
        authority: &A,
        identity: &IdentityId,
    ) -> Result<Self> {
        let server_half = authority
            .fetch_lks_server_half(identity)
            .await
            .map_err(DetKeyError::Unlock)?;

        let mut secret = Zeroizing::new([0u8; 32]);
        xor_bytes(&mut secret[..], client_half, &server_half[..])
            .map_err(|e| DetKeyError::Seal(e.to_string()))?;
        Ok(Self::from_secret(&secret, ContextSource::Unlocked))
    }

    /// Use a local secret the caller already holds.
    pub fn loaded(secret: [u8; 32]) -> Self {
        let secret = Zeroizing::new(secret);
        Self::from_secret(&secret, ContextSource::Loaded)
    }

    fn from_secret(secret: &[u8; 32], source: ContextSource) -> Self {
        Self {
            seal_key: Zeroizing::new(blake3::derive_key(SEAL_CONTEXT, secret)),
            source,
        }
    }

    pub fn source(&self) -> ContextSource {
        self.source
    }

    /// Encrypt a private key, binding the ciphertext to `kid`.
    pub fn seal<R>(&self, kid: KeyId, private_key: &[u8], rng: &mut R) -> Result<SealedKey>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut nonce = [0u8; 12];
        rng.try_fill_bytes(&mut nonce)
            .map_err(|e| DetKeyError::Seal(e.to_string()))?;

        let aad = kid.to_bytes();
        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: private_key,
                    aad: &aad,
                },
            )
            .map_err(|e| DetKeyError::Seal(e.to_string()))?;

        Ok(SealedKey {
            kid,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt a sealed private key.
    pub fn open(&self, sealed: &SealedKey) -> Result<Zeroizing<Vec<u8>>> {
        let aad = sealed.kid.to_bytes();
        self.cipher()?
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad: &aad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|e| DetKeyError::Seal(e.to_string()))
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.seal_key[..])
            .map_err(|e| DetKeyError::Seal(e.to_string()))
    }
}

impl fmt::Debug for LocalSecretContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSecretContext")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A private key encrypted under the local secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// The key this private key belongs to.
    pub kid: KeyId,
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use detkey_chain::MemoryAuthority;
    use detkey_core::{Ed25519KeyPair, PublicKey};
    use proptest::prelude::*;
    use rand::rngs::OsRng;

    fn kid() -> KeyId {
        PublicKey::Ed25519(Ed25519KeyPair::from_seed(&[0x42; 32]).public_key()).kid()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let ctx = LocalSecretContext::loaded([7; 32]);
        let sealed = ctx.seal(kid(), b"private bytes", &mut OsRng).unwrap();
        assert_ne!(sealed.ciphertext.as_slice(), b"private bytes");
        assert_eq!(ctx.open(&sealed).unwrap().as_slice(), b"private bytes");
    }

    #[test]
    fn test_open_with_other_secret_fails() {
        let sealed = LocalSecretContext::loaded([7; 32])
            .seal(kid(), b"private bytes", &mut OsRng)
            .unwrap();
        assert!(LocalSecretContext::loaded([8; 32]).open(&sealed).is_err());
    }

    #[test]
    fn test_sealed_key_bound_to_kid() {
        let ctx = LocalSecretContext::loaded([7; 32]);
        let mut sealed = ctx.seal(kid(), b"private bytes", &mut OsRng).unwrap();
        sealed.kid = PublicKey::Ed25519(Ed25519KeyPair::from_seed(&[1; 32]).public_key()).kid();
        assert!(matches!(ctx.open(&sealed), Err(DetKeyError::Seal(_))));
    }

    #[test]
    fn test_debug_hides_secret() {
        let ctx = LocalSecretContext::loaded([0xab; 32]);
        let shown = format!("{ctx:?}");
        assert!(!shown.contains("171"));
        assert!(!shown.to_lowercase().contains("abab"));
    }

    proptest! {
        #[test]
        fn seal_open_roundtrip(
            secret in any::<[u8; 32]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let ctx = LocalSecretContext::loaded(secret);
            let sealed = ctx.seal(kid(), &plaintext, &mut OsRng).unwrap();
            let opened = ctx.open(&sealed).unwrap();
            prop_assert_eq!(opened.as_slice(), plaintext.as_slice());
        }
    }

    #[tokio::test]
    async fn test_unlock_matches_loaded() {
        let authority = MemoryAuthority::new();
        let identity = IdentityId::derive("alice");
        let client = [0x0f; 32];
        let server = [0xf0; 32];
        authority.set_lks_server_half(identity, server);

        let unlocked = LocalSecretContext::unlock(&client, &authority, &identity)
            .await
            .unwrap();
        assert_eq!(unlocked.source(), ContextSource::Unlocked);

        let loaded = LocalSecretContext::loaded([0xff; 32]);
        let sealed = unlocked.seal(kid(), b"k", &mut OsRng).unwrap();
        assert_eq!(loaded.open(&sealed).unwrap().as_slice(), b"k");
    }

    #[tokio::test]
    async fn test_unlock_without_authority_half_fails() {
        let authority = MemoryAuthority::new();
        let err = LocalSecretContext::unlock(&[1; 32], &authority, &IdentityId::derive("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetKeyError::Unlock(_)));
    }
}
