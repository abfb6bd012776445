//! Chain links: signed statements binding a new public key to an identity.
//!
//! A link is immutable once signed. Its `link_id` is the hash of the
//! canonical statement bytes; its `sig_id` also covers the signature.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{decode_statement, statement_bytes};
use crate::crypto::{Blake3Hash, Ed25519Signature, KeyAlgorithm, KeyId, PublicKey, StatementSigner};
use crate::error::{CoreError, SigningError};
use crate::log::RunLog;
use crate::types::{IdentityId, LinkId, SigId};

/// Current statement schema version.
pub const STATEMENT_VERSION: u8 = 1;

/// Default lifetime of an issued key: ten years.
pub const DEFAULT_EXPIRE_SECS: u64 = 60 * 60 * 24 * 365 * 10;

/// Domain prefix for signature ids.
pub const SIG_ID_DOMAIN: &[u8] = b"detkey-sig-v0:";

/// The role a key plays for the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Signing key allowed to append further links.
    Sibkey,
    /// Key-exchange key used for encryption on behalf of the identity.
    Subkey,
}

impl KeyType {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Sibkey => 1,
            Self::Subkey => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sibkey),
            2 => Some(Self::Subkey),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sibkey => "sibkey",
            Self::Subkey => "subkey",
        }
    }

    /// The only algorithm a key of this type may use.
    pub fn algorithm(self) -> KeyAlgorithm {
        match self {
            Self::Sibkey => KeyAlgorithm::Ed25519,
            Self::Subkey => KeyAlgorithm::X25519,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unsigned body of a chain link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Schema version.
    pub version: u8,

    /// Identity whose chain this link extends.
    pub identity: IdentityId,

    /// Role of the new key.
    pub key_type: KeyType,

    /// The key being added.
    pub public_key: PublicKey,

    /// The identity's signing key at build time. Equal to the new key's id
    /// when an eldest key signs itself.
    pub signing_kid: KeyId,

    /// The identity's eldest key.
    pub eldest_kid: KeyId,

    /// Position of this link in the chain (1-indexed).
    pub seqno: u64,

    /// The link this one follows (None for seqno 1).
    pub prev: Option<LinkId>,

    /// Creation time, Unix seconds.
    pub ctime: i64,

    /// Expiry time, Unix seconds.
    pub expires_at: i64,
}

impl Statement {
    /// Canonical CBOR encoding; the bytes that get signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        statement_bytes(self)
    }

    pub fn link_id(&self) -> LinkId {
        LinkId(Blake3Hash::hash(&self.canonical_bytes()).0)
    }

    /// Sign the statement with the identity's current signing key.
    pub fn sign(self, signer: &dyn StatementSigner, log: &RunLog) -> Result<ChainLink, SigningError> {
        let actual = signer.key_id();
        if actual != self.signing_kid {
            return Err(SigningError::KeyMismatch {
                expected: self.signing_kid,
                actual,
            });
        }

        let body = self.canonical_bytes();
        let signature = signer.try_sign(&body)?;
        let link_id = LinkId(Blake3Hash::hash(&body).0);
        let sig_id = compute_sig_id(&body, &signature);
        log.signed(self.seqno, &sig_id, &link_id);

        Ok(ChainLink {
            statement: self,
            body: Bytes::from(body),
            signature,
            sig_id,
            link_id,
        })
    }
}

/// Compute a signature id over statement bytes and their signature.
pub fn compute_sig_id(body: &[u8], signature: &Ed25519Signature) -> SigId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(SIG_ID_DOMAIN);
    hasher.update(body);
    hasher.update(signature.as_bytes());
    SigId(*hasher.finalize().as_bytes())
}

/// Builder for chain statements.
pub struct LinkBuilder {
    identity: IdentityId,
    public_key: PublicKey,
    key_type: KeyType,
    signing_kid: KeyId,
    eldest_kid: Option<KeyId>,
    seqno: u64,
    prev: Option<LinkId>,
    ctime: i64,
    expire_secs: u64,
}

impl LinkBuilder {
    /// Start a statement adding `public_key` as `key_type`, authorized by `signing_kid`.
    pub fn new(
        identity: IdentityId,
        public_key: PublicKey,
        key_type: KeyType,
        signing_kid: KeyId,
    ) -> Self {
        Self {
            identity,
            public_key,
            key_type,
            signing_kid,
            eldest_kid: None,
            seqno: 1,
            prev: None,
            ctime: 0,
            expire_secs: DEFAULT_EXPIRE_SECS,
        }
    }

    /// Set the eldest key. Defaults to the signing key.
    pub fn eldest(mut self, kid: KeyId) -> Self {
        self.eldest_kid = Some(kid);
        self
    }

    /// Follow the link `prev` at position `prev_seqno`.
    pub fn prev(mut self, prev: LinkId, prev_seqno: u64) -> Self {
        self.prev = Some(prev);
        self.seqno = prev_seqno + 1;
        self
    }

    /// Set the creation time (Unix seconds).
    pub fn ctime(mut self, ctime: i64) -> Self {
        self.ctime = ctime;
        self
    }

    /// Expire the key `secs` seconds after creation.
    pub fn expire_in(mut self, secs: u64) -> Self {
        self.expire_secs = secs;
        self
    }

    pub fn build(self) -> Statement {
        let expire = i64::try_from(self.expire_secs).unwrap_or(i64::MAX);
        Statement {
            version: STATEMENT_VERSION,
            identity: self.identity,
            key_type: self.key_type,
            public_key: self.public_key,
            signing_kid: self.signing_kid,
            eldest_kid: self.eldest_kid.unwrap_or(self.signing_kid),
            seqno: self.seqno,
            prev: self.prev,
            ctime: self.ctime,
            expires_at: self.ctime.saturating_add(expire),
        }
    }
}

/// A signed, immutable chain link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// The decoded statement.
    pub statement: Statement,

    /// Canonical statement bytes, exactly as signed.
    pub body: Bytes,

    /// Signature over `body` by `statement.signing_kid`.
    pub signature: Ed25519Signature,

    pub sig_id: SigId,

    pub link_id: LinkId,
}

impl ChainLink {
    /// Check the signature and that the statement is internally coherent.
    pub fn verify(&self) -> Result<(), CoreError> {
        let statement = &self.statement;
        if statement.public_key.algorithm() != statement.key_type.algorithm() {
            return Err(CoreError::MalformedStatement(format!(
                "{} key must be {}, got {}",
                statement.key_type,
                statement.key_type.algorithm(),
                statement.public_key.algorithm()
            )));
        }
        if (statement.seqno == 1) != statement.prev.is_none() {
            return Err(CoreError::MalformedStatement(
                "prev must be set exactly when seqno > 1".into(),
            ));
        }
        let signing_key = statement
            .signing_kid
            .ed25519()
            .ok_or(CoreError::InvalidPublicKey)?;
        signing_key.verify(&self.body, &self.signature)
    }

    /// Wire form of the signed statement.
    pub fn blob(&self) -> SignatureBlob {
        SignatureBlob {
            alg: KeyAlgorithm::Ed25519.name().to_string(),
            body: hex::encode(&self.body),
            sig: self.signature.to_hex(),
        }
    }

    /// Decode a signed statement from its wire form and recompute its ids.
    ///
    /// Does not verify the signature; call [`ChainLink::verify`].
    pub fn from_blob(blob: &SignatureBlob) -> Result<Self, CoreError> {
        if blob.alg != KeyAlgorithm::Ed25519.name() {
            return Err(CoreError::DecodingError(format!(
                "unsupported signature algorithm: {}",
                blob.alg
            )));
        }
        let body = hex::decode(&blob.body).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        let signature = Ed25519Signature::from_hex(&blob.sig)
            .map_err(|e| CoreError::DecodingError(e.to_string()))?;
        let statement = decode_statement(&body)?;

        Ok(Self {
            statement,
            link_id: LinkId(Blake3Hash::hash(&body).0),
            sig_id: compute_sig_id(&body, &signature),
            body: Bytes::from(body),
            signature,
        })
    }
}

/// Algorithm-tagged signed statement as sent to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlob {
    /// Signature algorithm name.
    pub alg: String,
    /// Canonical statement bytes, hex.
    pub body: String,
    /// Signature bytes, hex.
    pub sig: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519KeyPair, LockedSigningKey, X25519KeyPair};

    fn eldest() -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(&[0x42; 32])
    }

    fn bootstrap_statement(key: &Ed25519KeyPair) -> Statement {
        let pk = PublicKey::Ed25519(key.public_key());
        LinkBuilder::new(IdentityId::derive("alice"), pk, KeyType::Sibkey, pk.kid())
            .ctime(1_700_000_000)
            .expire_in(100)
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let key = eldest();
        let statement = bootstrap_statement(&key);
        assert_eq!(statement.seqno, 1);
        assert_eq!(statement.prev, None);
        assert_eq!(statement.eldest_kid, statement.signing_kid);
        assert_eq!(statement.expires_at, 1_700_000_100);
    }

    #[test]
    fn test_builder_prev_sets_seqno() {
        let key = eldest();
        let signing = PublicKey::Ed25519(key.public_key()).kid();
        let dh = PublicKey::X25519(X25519KeyPair::from_bytes([9; 32]).public_key());
        let statement = LinkBuilder::new(IdentityId::derive("alice"), dh, KeyType::Subkey, signing)
            .prev(LinkId::from_bytes([0xab; 32]), 4)
            .build();
        assert_eq!(statement.seqno, 5);
        assert_eq!(statement.prev, Some(LinkId::from_bytes([0xab; 32])));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = eldest();
        let link = bootstrap_statement(&key).sign(&key, &RunLog::disabled()).unwrap();
        link.verify().unwrap();
        assert_eq!(link.link_id, link.statement.link_id());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let key = eldest();
        let a = bootstrap_statement(&key).sign(&key, &RunLog::disabled()).unwrap();
        let b = bootstrap_statement(&key).sign(&key, &RunLog::disabled()).unwrap();
        assert_eq!(a.sig_id, b.sig_id);
        assert_eq!(a.link_id, b.link_id);
    }

    #[test]
    fn test_sign_rejects_wrong_signer() {
        let key = eldest();
        let other = Ed25519KeyPair::from_seed(&[0x01; 32]);
        let err = bootstrap_statement(&key)
            .sign(&other, &RunLog::disabled())
            .unwrap_err();
        assert!(matches!(err, SigningError::KeyMismatch { .. }));
    }

    #[test]
    fn test_sign_with_locked_key_fails() {
        let key = eldest();
        let locked = LockedSigningKey(key.public_key());
        let err = bootstrap_statement(&key)
            .sign(&locked, &RunLog::disabled())
            .unwrap_err();
        assert!(matches!(err, SigningError::KeyUnavailable(_)));
    }

    #[test]
    fn test_blob_roundtrip_preserves_ids() {
        let key = eldest();
        let link = bootstrap_statement(&key).sign(&key, &RunLog::disabled()).unwrap();
        let decoded = ChainLink::from_blob(&link.blob()).unwrap();
        assert_eq!(decoded, link);
        decoded.verify().unwrap();
    }

    #[test]
    fn test_tampered_blob_fails_verification() {
        let key = eldest();
        let link = bootstrap_statement(&key).sign(&key, &RunLog::disabled()).unwrap();
        let mut other = bootstrap_statement(&key);
        other.ctime += 1;
        let mut blob = link.blob();
        blob.body = hex::encode(other.canonical_bytes());
        let decoded = ChainLink::from_blob(&blob).unwrap();
        assert!(decoded.verify().is_err());
    }

    #[test]
    fn test_verify_rejects_algorithm_mismatch() {
        let key = eldest();
        let signing = PublicKey::Ed25519(key.public_key()).kid();
        let dh = PublicKey::X25519(X25519KeyPair::from_bytes([9; 32]).public_key());
        let link = LinkBuilder::new(IdentityId::derive("alice"), dh, KeyType::Sibkey, signing)
            .prev(LinkId::from_bytes([1; 32]), 1)
            .build()
            .sign(&key, &RunLog::disabled())
            .unwrap();
        assert!(matches!(link.verify(), Err(CoreError::MalformedStatement(_))));
    }

    #[test]
    fn test_key_type_serde_names() {
        assert_eq!(serde_json::to_string(&KeyType::Sibkey).unwrap(), "\"sibkey\"");
        assert_eq!(serde_json::to_string(&KeyType::Subkey).unwrap(), "\"subkey\"");
    }
}
