//! # detkey testkit
//!
//! Testing utilities for deterministic key issuance.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known derivation inputs with their expected public keys
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: An in-memory authority, identity and local secret, plus
//!   test doubles for the deriver and the random source
//!
//! ## Golden Vectors
//!
//! ```rust
//! use detkey_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, ed25519, x25519) in verify_all_vectors() {
//!     assert!(matches, "{name}: {ed25519} {x25519}");
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use detkey_testkit::fixtures::{seeds, TestFixture};
//!
//! let fixture = TestFixture::new("alice");
//! let engine = fixture.engine();
//! let seeds = seeds(0x11, 0x22);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{seeds, ConstantRng, CountingDeriver, FailingRng, TestFixture};
