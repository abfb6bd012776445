//! # detkey
//!
//! Deterministic key issuance: derive an identity's signing key and
//! key-exchange key from caller-held seeds and a random server half, and
//! commit both to the identity's signature chain.
//!
//! ## Overview
//!
//! A run issues two keys in order:
//!
//! 1. **Signing key** (sibkey, Ed25519): split the signing seed, derive the
//!    keypair, sign a chain link adding it, publish.
//! 2. **Exchange key** (subkey, X25519): the same steps with the exchange seed.
//!
//! If the first stage fails the second never starts. Each private key is
//! sealed under the identity's local secret before its link is published.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use detkey::{DetKeyConfig, DetKeyEngine, DetKeySeeds, LocalSecretContext};
//! use detkey::chain::{Identity, MemoryAuthority};
//! use detkey::core::Seed;
//!
//! async fn example() {
//!     let authority = Arc::new(MemoryAuthority::new());
//!     let mut engine = DetKeyEngine::new(authority, DetKeyConfig::default());
//!     let ctx = LocalSecretContext::loaded([0u8; 32]);
//!     let mut identity = Identity::new("alice");
//!
//!     let seeds = DetKeySeeds {
//!         signing: Seed::from([1u8; 32]),
//!         exchange: Seed::from([2u8; 32]),
//!     };
//!     let outcome = engine.run(&ctx, &mut identity, None, seeds).await.unwrap();
//!     println!("signing key {}", outcome.signing.kid);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `detkey::core` - Splitting, derivation, and chain statements
//! - `detkey::chain` - Authority interface and chain-head tracking

pub mod context;
pub mod engine;
pub mod error;
pub mod rederive;

// Re-export component crates
pub use detkey_chain as chain;
pub use detkey_core as core;

pub use context::{ContextSource, LocalSecretContext, SealedKey};
pub use engine::{DetKeyConfig, DetKeyEngine, DetKeyOutcome, DetKeySeeds, IssuedKey, RunState};
pub use error::{DetKeyError, Result};
pub use rederive::{rederive_exchange, rederive_signing};

// Re-export commonly used types
pub use detkey_chain::{Authority, ChainPublisher, Identity, MemoryAuthority, PostRecord};
pub use detkey_core::{
    KeyDeriver, KeyId, KeyType, NaclDeriver, PublicKey, RunLog, Seed, ServerHalf,
    StatementSigner,
};
