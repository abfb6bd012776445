//! In-memory implementation of the Authority trait.
//!
//! This is primarily for testing. It checks links the way a real authority
//! does but keeps everything in memory, and it can inject failures and
//! latency.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

use detkey_core::{IdentityId, KeyId, KeyType, ServerHalf, SigId};

use crate::authority::{Authority, PostResult};
use crate::error::{AuthorityError, Result};
use crate::head::{BumpResult, ChainHead};
use crate::record::PostRecord;

/// In-memory authority.
///
/// All data is lost when the authority is dropped. Thread-safe via RwLock.
pub struct MemoryAuthority {
    inner: RwLock<MemoryAuthorityInner>,
}

#[derive(Default)]
struct MemoryAuthorityInner {
    /// Chains indexed by identity.
    chains: HashMap<IdentityId, StoredChain>,

    /// Server halves indexed by the key they derive.
    server_halves: HashMap<KeyId, ServerHalf>,

    /// Authority halves of each identity's local secret.
    lks_halves: HashMap<IdentityId, Zeroizing<[u8; 32]>>,

    /// Error returned by the next post, before it is applied.
    fail_next: Option<AuthorityError>,

    /// Apply the next post, then report a network error.
    drop_next_response: bool,

    /// Delay before each post is handled.
    latency: Option<Duration>,

    /// Number of post attempts, including failed ones.
    posts: usize,
}

#[derive(Default)]
struct StoredChain {
    head: ChainHead,
    eldest: Option<KeyId>,
    sibkeys: HashSet<KeyId>,
    seqnos: HashMap<SigId, u64>,
}

impl MemoryAuthority {
    /// Create a new empty authority.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryAuthorityInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryAuthorityInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryAuthorityInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next post with `error` without applying it.
    pub fn fail_next_post(&self, error: AuthorityError) {
        self.write().fail_next = Some(error);
    }

    /// Apply the next post but report a network error to the caller.
    pub fn drop_next_response(&self) {
        self.write().drop_next_response = true;
    }

    /// Delay every post by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = Some(latency);
    }

    /// Number of post attempts seen so far.
    pub fn post_count(&self) -> usize {
        self.read().posts
    }

    /// Current chain head for `identity`, if it has any links.
    pub fn head(&self, identity: &IdentityId) -> Option<ChainHead> {
        self.read()
            .chains
            .get(identity)
            .filter(|c| c.head.seqno > 0)
            .map(|c| c.head.clone())
    }

    /// Register the authority's half of an identity's local secret.
    pub fn set_lks_server_half(&self, identity: IdentityId, half: [u8; 32]) {
        self.write().lks_halves.insert(identity, Zeroizing::new(half));
    }

    fn apply(&self, record: &PostRecord) -> Result<PostResult> {
        let mut inner = self.write();
        inner.posts += 1;
        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }

        let link = record
            .link()
            .map_err(|e| AuthorityError::Rejected(e.to_string()))?;
        link.verify()
            .map_err(|e| AuthorityError::Rejected(e.to_string()))?;
        let server_half = record
            .server_half()
            .map_err(|e| AuthorityError::Rejected(e.to_string()))?;
        let statement = &link.statement;
        let kid = statement.public_key.kid();

        let chain = inner.chains.entry(statement.identity).or_default();

        // Check if exact link already exists
        if let Some(&seqno) = chain.seqnos.get(&link.sig_id) {
            return Ok(PostResult::AlreadyExists { seqno });
        }

        // Check the link follows the head
        if statement.seqno != chain.head.next_seqno() || statement.prev != chain.head.link_id {
            return Err(AuthorityError::StaleHead {
                expected: chain.head.next_seqno(),
                got: statement.seqno,
            });
        }

        if statement.seqno == 1 {
            let self_signed = statement.key_type == KeyType::Sibkey
                && statement.signing_kid == kid
                && statement.eldest_kid == kid;
            if !self_signed {
                return Err(AuthorityError::Unauthorized(
                    "first link must be a self-signed sibkey".into(),
                ));
            }
        } else {
            if chain.eldest != Some(statement.eldest_kid) {
                return Err(AuthorityError::Unauthorized(format!(
                    "eldest key mismatch: {}",
                    statement.eldest_kid
                )));
            }
            if !chain.sibkeys.contains(&statement.signing_kid) {
                return Err(AuthorityError::Unauthorized(format!(
                    "signing key {} is not a sibkey",
                    statement.signing_kid
                )));
            }
        }

        if let BumpResult::OutOfOrder { expected, got } =
            chain
                .head
                .bump(statement.seqno, statement.prev, link.link_id, link.sig_id)
        {
            return Err(AuthorityError::StaleHead { expected, got });
        }

        if chain.eldest.is_none() {
            chain.eldest = Some(statement.eldest_kid);
        }
        if statement.key_type == KeyType::Sibkey {
            chain.sibkeys.insert(kid);
        }
        chain.seqnos.insert(link.sig_id, statement.seqno);
        let seqno = statement.seqno;
        inner.server_halves.insert(kid, server_half);

        if std::mem::take(&mut inner.drop_next_response) {
            return Err(AuthorityError::Network("response lost".into()));
        }
        Ok(PostResult::Accepted { seqno })
    }
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authority for MemoryAuthority {
    async fn post_new_key(&self, record: &PostRecord) -> Result<PostResult> {
        let latency = self.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.apply(record)
    }

    async fn fetch_server_half(&self, kid: &KeyId) -> Result<Option<ServerHalf>> {
        let half = self.read().server_halves.get(kid).cloned();
        Ok(half)
    }

    async fn fetch_lks_server_half(&self, identity: &IdentityId) -> Result<Zeroizing<[u8; 32]>> {
        let half = self.read().lks_halves.get(identity).cloned();
        half.ok_or_else(|| AuthorityError::NotFound(format!("local secret half for {identity}")))
    }
}
