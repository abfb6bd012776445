//! Strong identifier types.
//!
//! All identifiers are 32-byte newtypes so a link id can never be passed
//! where a signature id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
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

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

hash_id! {
    /// Identifies the identity whose chain a link extends.
    ///
    /// Derived from Blake3 over the identity's account name.
    IdentityId
}

hash_id! {
    /// Blake3 of the canonical statement bytes. Chains links together via `prev`.
    LinkId
}

hash_id! {
    /// Blake3 of the statement bytes and their signature.
    ///
    /// Keys publication idempotency: the same signed statement always has
    /// the same signature id.
    SigId
}

impl IdentityId {
    /// Derive an identity id from an account name.
    pub fn derive(name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"detkey-identity-v0:");
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_hex_roundtrip() {
        let id = LinkId::from_bytes([0x42; 32]);
        let recovered = LinkId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_sig_id_from_hex_rejects_short_input() {
        assert!(SigId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_display_and_debug() {
        let id = SigId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
        assert!(format!("{:?}", id).starts_with("SigId("));
    }

    #[test]
    fn test_identity_derivation() {
        assert_eq!(IdentityId::derive("alice"), IdentityId::derive("alice"));
        assert_ne!(IdentityId::derive("alice"), IdentityId::derive("bob"));
    }
}
