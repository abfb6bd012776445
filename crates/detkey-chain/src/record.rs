//! The wire payload sent to the authority for each new key.

use serde::{Deserialize, Serialize};

use detkey_core::{
    ChainLink, CoreError, KeyAlgorithm, KeyId, KeyType, PublicKey, ServerHalf, SigId,
    SignatureBlob,
};

/// Algorithm-tagged raw public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyWire {
    pub alg: String,
    /// Raw key bytes, hex.
    pub key: String,
}

impl PublicKeyWire {
    pub fn to_public_key(&self) -> Result<PublicKey, CoreError> {
        let algorithm = KeyAlgorithm::from_name(&self.alg)
            .ok_or_else(|| CoreError::DecodingError(format!("unknown algorithm: {}", self.alg)))?;
        let bytes: [u8; 32] = hex::decode(&self.key)
            .map_err(|e| CoreError::DecodingError(e.to_string()))?
            .try_into()
            .map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(PublicKey::from_parts(algorithm, bytes))
    }
}

impl From<&PublicKey> for PublicKeyWire {
    fn from(pk: &PublicKey) -> Self {
        Self {
            alg: pk.algorithm().name().to_string(),
            key: pk.to_hex(),
        }
    }
}

/// A new-key post.
///
/// Carries the server half so the authority can hand the same half back
/// later; without it the key cannot be re-derived, even from the right seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub signature: SignatureBlob,
    /// Signature id, hex.
    pub signature_id: String,
    pub key_type: KeyType,
    pub public_key: PublicKeyWire,
    pub signing_key_id: KeyId,
    pub eldest_key_id: KeyId,
    /// Server half, hex.
    pub server_half: String,
}

impl PostRecord {
    /// Build the post for a signed link and the server half used to derive its key.
    pub fn new(link: &ChainLink, server_half: &ServerHalf) -> Self {
        let statement = &link.statement;
        Self {
            signature: link.blob(),
            signature_id: link.sig_id.to_hex(),
            key_type: statement.key_type,
            public_key: PublicKeyWire::from(&statement.public_key),
            signing_key_id: statement.signing_kid,
            eldest_key_id: statement.eldest_kid,
            server_half: server_half.to_hex(),
        }
    }

    pub fn sig_id(&self) -> Result<SigId, CoreError> {
        SigId::from_hex(&self.signature_id).map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    pub fn server_half(&self) -> Result<ServerHalf, CoreError> {
        ServerHalf::from_hex(&self.server_half).map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Decode the signed link and check the record's outer fields agree with it.
    pub fn link(&self) -> Result<ChainLink, CoreError> {
        let link = ChainLink::from_blob(&self.signature)?;
        let statement = &link.statement;

        if self.sig_id()? != link.sig_id {
            return Err(CoreError::MalformedStatement("signature id mismatch".into()));
        }
        if self.key_type != statement.key_type
            || self.public_key.to_public_key()? != statement.public_key
            || self.signing_key_id != statement.signing_kid
            || self.eldest_key_id != statement.eldest_kid
        {
            return Err(CoreError::MalformedStatement(
                "record fields disagree with signed statement".into(),
            ));
        }
        Ok(link)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
