//! Cryptographic primitives for deterministic key issuance.
//!
//! Wraps Ed25519 signing, X25519 key agreement and Blake3 hashing with strong
//! types. Private halves zeroize on drop and never appear in `Debug` output.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::error::{CoreError, SigningError};

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 32-byte X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// Public key algorithm, tagged into every [`KeyId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// Ed25519 signatures (sibkeys).
    Ed25519,
    /// X25519 Diffie-Hellman (subkeys).
    X25519,
}

impl KeyAlgorithm {
    /// The type byte used inside a key id.
    pub const fn code(self) -> u8 {
        match self {
            Self::Ed25519 => 0x20,
            Self::X25519 => 0x21,
        }
    }

    /// Parse a key id type byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x20 => Some(Self::Ed25519),
            0x21 => Some(Self::X25519),
            _ => None,
        }
    }

    /// Wire name of the algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::X25519 => "x25519",
        }
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ed25519" => Some(Self::Ed25519),
            "x25519" => Some(Self::X25519),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm-tagged public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKey {
    Ed25519(Ed25519PublicKey),
    X25519(X25519PublicKey),
}

impl PublicKey {
    /// Rebuild a public key from its algorithm and raw bytes.
    pub fn from_parts(algorithm: KeyAlgorithm, bytes: [u8; 32]) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => Self::Ed25519(Ed25519PublicKey(bytes)),
            KeyAlgorithm::X25519 => Self::X25519(X25519PublicKey(bytes)),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::X25519(_) => KeyAlgorithm::X25519,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        match self {
            Self::Ed25519(pk) => pk.as_bytes(),
            Self::X25519(pk) => pk.as_bytes(),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// The key id naming this key on the chain.
    pub fn kid(&self) -> KeyId {
        KeyId {
            algorithm: self.algorithm(),
            key: *self.as_bytes(),
        }
    }
}

impl From<Ed25519PublicKey> for PublicKey {
    fn from(pk: Ed25519PublicKey) -> Self {
        Self::Ed25519(pk)
    }
}

impl From<X25519PublicKey> for PublicKey {
    fn from(pk: X25519PublicKey) -> Self {
        Self::X25519(pk)
    }
}

/// Key id: `0x01 || algorithm || public key || 0x0a`.
///
/// The key id carries the whole public key, so it converts back to a
/// [`PublicKey`] without a lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId {
    algorithm: KeyAlgorithm,
    key: [u8; 32],
}

impl KeyId {
    /// Encoded length in bytes.
    pub const LEN: usize = 35;

    const VERSION: u8 = 0x01;
    const TRAILER: u8 = 0x0a;

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_parts(self.algorithm, self.key)
    }

    /// The Ed25519 key this id names, if it names one.
    pub fn ed25519(&self) -> Option<Ed25519PublicKey> {
        match self.algorithm {
            KeyAlgorithm::Ed25519 => Some(Ed25519PublicKey(self.key)),
            KeyAlgorithm::X25519 => None,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = Self::VERSION;
        out[1] = self.algorithm.code();
        out[2..34].copy_from_slice(&self.key);
        out[34] = Self::TRAILER;
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != Self::LEN {
            return Err(CoreError::InvalidKeyId(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        if bytes[0] != Self::VERSION || bytes[34] != Self::TRAILER {
            return Err(CoreError::InvalidKeyId("bad framing".into()));
        }
        let algorithm = KeyAlgorithm::from_code(bytes[1])
            .ok_or_else(|| CoreError::InvalidKeyId(format!("unknown type {:#04x}", bytes[1])))?;
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[2..34]);
        Ok(Self { algorithm, key })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidKeyId(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", &self.to_hex()[..20])
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for KeyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Anything that can sign a chain statement on behalf of an identity.
pub trait StatementSigner: Send + Sync {
    /// Key id of the signing key; must match the statement's signing key.
    fn key_id(&self) -> KeyId;

    /// Sign a message, failing if the private half is not available.
    fn try_sign(&self, message: &[u8]) -> Result<Ed25519Signature, SigningError>;
}

/// An Ed25519 keypair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Expand a 32-byte seed into a keypair (RFC 8032, no extra entropy).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// The seed bytes. Only for sealing into a caller-owned store.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl StatementSigner for Ed25519KeyPair {
    fn key_id(&self) -> KeyId {
        PublicKey::Ed25519(self.public_key()).kid()
    }

    fn try_sign(&self, message: &[u8]) -> Result<Ed25519Signature, SigningError> {
        self.signing_key
            .try_sign(message)
            .map(|sig| Ed25519Signature(sig.to_bytes()))
            .map_err(|e| SigningError::Primitive(e.to_string()))
    }
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519KeyPair({:?})", self.public_key())
    }
}

/// A signing key known only by its public half, e.g. one whose secret is
/// still locked in the caller's keyring. Always fails to sign.
#[derive(Debug, Clone, Copy)]
pub struct LockedSigningKey(pub Ed25519PublicKey);

impl StatementSigner for LockedSigningKey {
    fn key_id(&self) -> KeyId {
        PublicKey::Ed25519(self.0).kid()
    }

    fn try_sign(&self, _message: &[u8]) -> Result<Ed25519Signature, SigningError> {
        Err(SigningError::KeyUnavailable(self.key_id()))
    }
}

/// An X25519 keypair.
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl X25519KeyPair {
    /// Build a keypair from 32 secret bytes. Clamping happens at scalar
    /// multiplication, so the bytes are used as given.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = X25519PublicKey(*x25519_dalek::PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> Zeroizing<[u8; 32]> {
        let shared = self
            .secret
            .diffie_hellman(&x25519_dalek::PublicKey::from(peer.0));
        Zeroizing::new(*shared.as_bytes())
    }

    /// The secret bytes. Only for sealing into a caller-owned store.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }
}

impl fmt::Debug for X25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519KeyPair({:?})", self.public)
    }
}
