//! Authority trait: the remote party that stores server halves and accepts
//! chain links.
//!
//! The engine is transport-agnostic. Implementations include an HTTP client
//! (outside this workspace) and [`MemoryAuthority`](crate::MemoryAuthority)
//! for tests.

use std::sync::Arc;

use async_trait::async_trait;
use detkey_core::{IdentityId, KeyId, ServerHalf};
use zeroize::Zeroizing;

use crate::error::Result;
use crate::record::PostRecord;

/// Result of posting a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostResult {
    /// The link was appended at `seqno`.
    Accepted { seqno: u64 },
    /// A link with the same signature id was already appended (idempotent,
    /// not an error).
    AlreadyExists { seqno: u64 },
}

impl PostResult {
    pub fn seqno(&self) -> u64 {
        match self {
            PostResult::Accepted { seqno } | PostResult::AlreadyExists { seqno } => *seqno,
        }
    }
}

/// Async interface to the key authority.
///
/// # Design Notes
///
/// - **Idempotent posts**: posting a record whose signature id is already
///   on the chain returns `AlreadyExists` and changes nothing.
/// - **Ordered chain**: a post whose seqno does not follow the authority's
///   head fails with `StaleHead`.
/// - **Server halves**: the authority keeps the server half of every key it
///   accepts, keyed by the key id.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Append a new key link to the identity's chain.
    async fn post_new_key(&self, record: &PostRecord) -> Result<PostResult>;

    /// The server half stored for `kid`, if the authority accepted that key.
    async fn fetch_server_half(&self, kid: &KeyId) -> Result<Option<ServerHalf>>;

    /// The authority's half of the identity's local secret.
    async fn fetch_lks_server_half(&self, identity: &IdentityId) -> Result<Zeroizing<[u8; 32]>>;
}

#[async_trait]
impl<A: Authority + ?Sized> Authority for Arc<A> {
    async fn post_new_key(&self, record: &PostRecord) -> Result<PostResult> {
        (**self).post_new_key(record).await
    }

    async fn fetch_server_half(&self, kid: &KeyId) -> Result<Option<ServerHalf>> {
        (**self).fetch_server_half(kid).await
    }

    async fn fetch_lks_server_half(&self, identity: &IdentityId) -> Result<Zeroizing<[u8; 32]>> {
        (**self).fetch_lks_server_half(identity).await
    }
}
