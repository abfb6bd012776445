//! # detkey chain
//!
//! Authority interface and chain-head tracking for deterministic key
//! issuance.
//!
//! ## Overview
//!
//! New keys are committed to an identity's signature chain by posting a
//! [`PostRecord`] to an [`Authority`]. The [`ChainPublisher`] sends the post
//! and, once the authority accepts it, advances the caller's [`Identity`].
//!
//! ## Key Types
//!
//! - [`Authority`] - The async trait for the remote key authority
//! - [`MemoryAuthority`] - In-memory authority for tests
//! - [`ChainPublisher`] - Publishes records and advances the local head
//! - [`Identity`] / [`ChainHead`] - Local view of an identity's chain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use detkey_chain::{ChainPublisher, Identity, MemoryAuthority, PublisherConfig};
//!
//! async fn example() {
//!     let authority = Arc::new(MemoryAuthority::new());
//!     let publisher = ChainPublisher::new(authority, PublisherConfig::default());
//!     let mut identity = Identity::new("alice");
//!
//!     // let record = PostRecord::new(&link, &server_half);
//!     // publisher.publish(&mut identity, &record, &log).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent publish**: Publishing the same signature id twice is a no-op
//! - **Ordered head**: A link must name the current head as `prev`
//! - **Failure leaves state**: A failed publish never moves the local head

pub mod authority;
pub mod error;
pub mod head;
pub mod memory;
pub mod publisher;
pub mod record;

pub use authority::{Authority, PostResult};
pub use error::{AuthorityError, PublishError, Result};
pub use head::{ActiveKey, BumpResult, ChainHead, Identity};
pub use memory::MemoryAuthority;
pub use publisher::{ChainPublisher, PublishOutcome, PublisherConfig};
pub use record::{PostRecord, PublicKeyWire};
