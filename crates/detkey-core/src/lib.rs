//! # detkey core
//!
//! Pure primitives for deterministic key issuance: seed splitting, keypair
//! derivation, and signed chain statements.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Protocol
//!
//! 1. [`split`] draws a random [`ServerHalf`] the length of the caller's
//!    [`Seed`] and XORs them into a [`DerivationInput`].
//! 2. A [`KeyDeriver`] turns the derivation input into an Ed25519 (signing)
//!    or X25519 (exchange) keypair. The same input always gives the same key.
//! 3. A [`LinkBuilder`] assembles a [`Statement`] naming the new key, which
//!    the identity's current signing key turns into a [`ChainLink`].
//!
//! The seed never leaves the caller and the server half is stored by the
//! authority, so reproducing a key later needs both.
//!
//! ## Canonicalization
//!
//! Statements are encoded using deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod crypto;
pub mod derive;
pub mod error;
pub mod link;
pub mod log;
pub mod split;
pub mod types;

pub use canonical::{decode_statement, statement_bytes};
pub use crypto::{
    Blake3Hash, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, KeyAlgorithm, KeyId,
    LockedSigningKey, PublicKey, StatementSigner, X25519KeyPair, X25519PublicKey,
};
pub use derive::{KeyDeriver, NaclDeriver};
pub use error::{CoreError, KeyGenerationError, SigningError, SplitError};
pub use link::{
    compute_sig_id, ChainLink, KeyType, LinkBuilder, SignatureBlob, Statement,
    DEFAULT_EXPIRE_SECS, STATEMENT_VERSION,
};
pub use log::RunLog;
pub use split::{combine, split, xor_bytes, DerivationInput, EntropySource, Seed, ServerHalf, SEED_LEN};
pub use types::{IdentityId, LinkId, SigId};
