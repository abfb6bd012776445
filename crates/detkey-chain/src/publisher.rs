//! Publishing signed links and advancing the identity's chain head.

use std::sync::Arc;
use std::time::Duration;

use crate::authority::Authority;
use crate::error::PublishError;
use crate::head::{BumpResult, Identity};
use crate::record::PostRecord;
use detkey_core::RunLog;

/// Configuration for publishing.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Timeout for one authority post.
    pub timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The local head advanced to `seqno`.
    Advanced { seqno: u64 },
    /// The link was already applied locally; nothing changed.
    AlreadyApplied { seqno: u64 },
}

impl PublishOutcome {
    pub fn seqno(&self) -> u64 {
        match self {
            PublishOutcome::Advanced { seqno } | PublishOutcome::AlreadyApplied { seqno } => *seqno,
        }
    }
}

/// Sends new-key records to the authority and advances the local head.
pub struct ChainPublisher<A: Authority> {
    authority: Arc<A>,
    config: PublisherConfig,
}

impl<A: Authority> ChainPublisher<A> {
    pub fn new(authority: Arc<A>, config: PublisherConfig) -> Self {
        Self { authority, config }
    }

    pub fn authority(&self) -> &Arc<A> {
        &self.authority
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Publish `record` and advance `identity`'s head to its link.
    ///
    /// Publishing a record whose signature id is already applied returns
    /// `AlreadyApplied` without contacting the authority. On error the head
    /// is unchanged and the same record may be published again.
    pub async fn publish(
        &self,
        identity: &mut Identity,
        record: &PostRecord,
        log: &RunLog,
    ) -> Result<PublishOutcome, PublishError> {
        let link = record.link()?;
        let statement = &link.statement;

        if identity.chain().has_applied(&link.sig_id) {
            log.duplicate(&link.sig_id);
            return Ok(PublishOutcome::AlreadyApplied {
                seqno: statement.seqno,
            });
        }
        if statement.identity != identity.id() {
            return Err(PublishError::Rejected(format!(
                "link is for identity {}, not {}",
                statement.identity,
                identity.id()
            )));
        }

        let expected = identity.chain().next_seqno();
        if statement.seqno != expected || statement.prev != identity.chain().link_id {
            return Err(PublishError::StaleHead {
                expected,
                got: statement.seqno,
            });
        }

        let posted = tokio::time::timeout(self.config.timeout, self.authority.post_new_key(record))
            .await
            .map_err(|_| PublishError::Timeout(self.config.timeout))??;
        tracing::debug!(parent: log.span(), result = ?posted, "authority replied");

        match identity.apply(&link) {
            BumpResult::Advanced => {
                log.published(statement.seqno, &link.sig_id);
                Ok(PublishOutcome::Advanced {
                    seqno: statement.seqno,
                })
            }
            BumpResult::Duplicate => {
                log.duplicate(&link.sig_id);
                Ok(PublishOutcome::AlreadyApplied {
                    seqno: statement.seqno,
                })
            }
            BumpResult::OutOfOrder { expected, got } => {
                Err(PublishError::StaleHead { expected, got })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthorityError;
    use crate::memory::MemoryAuthority;
    use detkey_core::{
        ChainLink, Ed25519KeyPair, KeyType, LinkBuilder, PublicKey, ServerHalf, X25519KeyPair,
    };

    fn bootstrap(identity: &Identity, key: &Ed25519KeyPair) -> ChainLink {
        let pk = PublicKey::Ed25519(key.public_key());
        LinkBuilder::new(identity.id(), pk, KeyType::Sibkey, pk.kid())
            .build()
            .sign(key, &RunLog::disabled())
            .unwrap()
    }

    fn record(link: &ChainLink) -> PostRecord {
        PostRecord::new(link, &ServerHalf::from_bytes(vec![0x22; 32]))
    }

    fn publisher(authority: &Arc<MemoryAuthority>) -> ChainPublisher<MemoryAuthority> {
        ChainPublisher::new(Arc::clone(authority), PublisherConfig::default())
    }

    #[tokio::test]
    async fn test_publish_advances_head() {
        let authority = Arc::new(MemoryAuthority::new());
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let link = bootstrap(&identity, &key);

        let outcome = publisher(&authority)
            .publish(&mut identity, &record(&link), &RunLog::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Advanced { seqno: 1 });
        assert_eq!(identity.chain().sig_id, Some(link.sig_id));
        assert_eq!(authority.head(&identity.id()).unwrap().seqno, 1);
    }

    #[tokio::test]
    async fn test_publish_twice_is_noop() {
        let authority = Arc::new(MemoryAuthority::new());
        let publisher = publisher(&authority);
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let record = record(&bootstrap(&identity, &key));

        publisher
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap();
        let again = publisher
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap();

        assert_eq!(again, PublishOutcome::AlreadyApplied { seqno: 1 });
        assert_eq!(identity.chain().seqno, 1);
        assert_eq!(authority.post_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_lost_response() {
        let authority = Arc::new(MemoryAuthority::new());
        let publisher = publisher(&authority);
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let record = record(&bootstrap(&identity, &key));

        authority.drop_next_response();
        let err = publisher
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(identity.chain().seqno, 0);

        let outcome = publisher
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Advanced { seqno: 1 });
        assert_eq!(authority.head(&identity.id()).unwrap().seqno, 1);
    }

    #[tokio::test]
    async fn test_authority_error_leaves_head() {
        let authority = Arc::new(MemoryAuthority::new());
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let record = record(&bootstrap(&identity, &key));

        authority.fail_next_post(AuthorityError::Rejected("no".into()));
        let err = publisher(&authority)
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected(_)));
        assert!(!err.is_retryable());
        assert_eq!(identity.chain().seqno, 0);
    }

    #[tokio::test]
    async fn test_rejects_link_not_following_head() {
        let authority = Arc::new(MemoryAuthority::new());
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let kid = PublicKey::Ed25519(key.public_key()).kid();
        let dh = PublicKey::X25519(X25519KeyPair::from_bytes([5; 32]).public_key());
        let link = LinkBuilder::new(identity.id(), dh, KeyType::Subkey, kid)
            .prev(detkey_core::LinkId::from_bytes([1; 32]), 1)
            .build()
            .sign(&key, &RunLog::disabled())
            .unwrap();

        let err = publisher(&authority)
            .publish(&mut identity, &record(&link), &RunLog::disabled())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::StaleHead {
                expected: 1,
                got: 2
            }
        ));
        assert_eq!(authority.post_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_foreign_identity() {
        let authority = Arc::new(MemoryAuthority::new());
        let mut alice = Identity::new("alice");
        let bob = Identity::new("bob");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let record = record(&bootstrap(&bob, &key));

        let err = publisher(&authority)
            .publish(&mut alice, &record, &RunLog::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_times_out() {
        let authority = Arc::new(MemoryAuthority::new());
        authority.set_latency(Duration::from_secs(60));
        let publisher = ChainPublisher::new(
            Arc::clone(&authority),
            PublisherConfig {
                timeout: Duration::from_secs(1),
            },
        );
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let record = record(&bootstrap(&identity, &key));

        let err = publisher
            .publish(&mut identity, &record, &RunLog::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(identity.chain().seqno, 0);
    }
}
