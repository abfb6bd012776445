//! Local view of an identity's chain: head pointer and active keys.

use std::collections::BTreeSet;

use detkey_core::{ChainLink, IdentityId, KeyId, KeyType, LinkId, SigId};

/// The head of an identity's chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainHead {
    /// Sequence number of the last applied link (0 for an empty chain).
    pub seqno: u64,

    /// Link id at `seqno`.
    pub link_id: Option<LinkId>,

    /// Signature id at `seqno`.
    pub sig_id: Option<SigId>,

    /// Every signature id applied so far.
    applied: BTreeSet<SigId>,
}

/// Result of advancing the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpResult {
    /// The link extended the head.
    Advanced,
    /// The link was already applied; nothing changed.
    Duplicate,
    /// The link does not follow the current head.
    OutOfOrder { expected: u64, got: u64 },
}

impl ChainHead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next link must carry.
    pub fn next_seqno(&self) -> u64 {
        self.seqno + 1
    }

    pub fn has_applied(&self, sig_id: &SigId) -> bool {
        self.applied.contains(sig_id)
    }

    /// Advance to `(link_id, sig_id)` if the link directly follows the head.
    pub fn bump(
        &mut self,
        seqno: u64,
        prev: Option<LinkId>,
        link_id: LinkId,
        sig_id: SigId,
    ) -> BumpResult {
        if self.applied.contains(&sig_id) {
            return BumpResult::Duplicate;
        }
        if seqno != self.next_seqno() || prev != self.link_id {
            return BumpResult::OutOfOrder {
                expected: self.next_seqno(),
                got: seqno,
            };
        }

        self.seqno = seqno;
        self.link_id = Some(link_id);
        self.sig_id = Some(sig_id);
        self.applied.insert(sig_id);
        BumpResult::Advanced
    }
}

/// A key added to the identity by an applied link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveKey {
    pub kid: KeyId,
    pub key_type: KeyType,
    /// The link that added the key.
    pub sig_id: SigId,
    /// Unix seconds.
    pub expires_at: i64,
}

/// The identity a run issues keys for.
///
/// Owned by the caller. Runs borrow it mutably, so one identity cannot have
/// two runs in flight.
#[derive(Debug, Clone)]
pub struct Identity {
    id: IdentityId,
    name: String,
    chain: ChainHead,
    eldest: Option<KeyId>,
    keys: Vec<ActiveKey>,
}

impl Identity {
    /// A fresh identity with an empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: IdentityId::derive(&name),
            name,
            chain: ChainHead::new(),
            eldest: None,
            keys: Vec::new(),
        }
    }

    pub fn id(&self) -> IdentityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain(&self) -> &ChainHead {
        &self.chain
    }

    pub fn eldest(&self) -> Option<KeyId> {
        self.eldest
    }

    pub fn keys(&self) -> &[ActiveKey] {
        &self.keys
    }

    pub fn sibkeys(&self) -> impl Iterator<Item = &ActiveKey> {
        self.keys.iter().filter(|k| k.key_type == KeyType::Sibkey)
    }

    pub fn subkeys(&self) -> impl Iterator<Item = &ActiveKey> {
        self.keys.iter().filter(|k| k.key_type == KeyType::Subkey)
    }

    pub fn has_key(&self, kid: &KeyId) -> bool {
        self.keys.iter().any(|k| &k.kid == kid)
    }

    /// Whether `kid` is a sibkey of this identity that has not expired at `at`.
    pub fn can_sign(&self, kid: &KeyId, at: i64) -> bool {
        self.sibkeys().any(|k| &k.kid == kid && k.expires_at > at)
    }

    /// Record an accepted link: advance the head and register its key.
    pub fn apply(&mut self, link: &ChainLink) -> BumpResult {
        let statement = &link.statement;
        let result = self
            .chain
            .bump(statement.seqno, statement.prev, link.link_id, link.sig_id);

        if result == BumpResult::Advanced {
            if self.eldest.is_none() {
                self.eldest = Some(statement.eldest_kid);
            }
            self.keys.push(ActiveKey {
                kid: statement.public_key.kid(),
                key_type: statement.key_type,
                sig_id: link.sig_id,
                expires_at: statement.expires_at,
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detkey_core::{Ed25519KeyPair, LinkBuilder, PublicKey, RunLog, X25519KeyPair};

    fn eldest_link(identity: &Identity, key: &Ed25519KeyPair) -> ChainLink {
        let pk = PublicKey::Ed25519(key.public_key());
        LinkBuilder::new(identity.id(), pk, KeyType::Sibkey, pk.kid())
            .build()
            .sign(key, &RunLog::disabled())
            .unwrap()
    }

    #[test]
    fn test_head_contiguous_bump() {
        let mut head = ChainHead::new();
        let l1 = LinkId::from_bytes([1; 32]);
        let l2 = LinkId::from_bytes([2; 32]);

        assert_eq!(
            head.bump(1, None, l1, SigId::from_bytes([1; 32])),
            BumpResult::Advanced
        );
        assert_eq!(
            head.bump(2, Some(l1), l2, SigId::from_bytes([2; 32])),
            BumpResult::Advanced
        );
        assert_eq!(head.seqno, 2);
        assert_eq!(head.link_id, Some(l2));
    }

    #[test]
    fn test_head_duplicate_does_not_advance() {
        let mut head = ChainHead::new();
        let sig = SigId::from_bytes([9; 32]);
        head.bump(1, None, LinkId::from_bytes([1; 32]), sig);

        assert_eq!(
            head.bump(1, None, LinkId::from_bytes([1; 32]), sig),
            BumpResult::Duplicate
        );
        assert_eq!(head.seqno, 1);
    }

    #[test]
    fn test_head_rejects_gap_and_wrong_prev() {
        let mut head = ChainHead::new();
        let l1 = LinkId::from_bytes([1; 32]);
        head.bump(1, None, l1, SigId::from_bytes([1; 32]));

        assert_eq!(
            head.bump(3, Some(l1), LinkId::from_bytes([3; 32]), SigId::from_bytes([3; 32])),
            BumpResult::OutOfOrder {
                expected: 2,
                got: 3
            }
        );
        assert_eq!(
            head.bump(
                2,
                Some(LinkId::from_bytes([7; 32])),
                LinkId::from_bytes([2; 32]),
                SigId::from_bytes([2; 32])
            ),
            BumpResult::OutOfOrder {
                expected: 2,
                got: 2
            }
        );
        assert_eq!(head.seqno, 1);
    }

    #[test]
    fn test_identity_apply_registers_keys() {
        let mut identity = Identity::new("alice");
        let key = Ed25519KeyPair::from_seed(&[0x42; 32]);
        let link = eldest_link(&identity, &key);
        assert_eq!(identity.apply(&link), BumpResult::Advanced);

        let kid = PublicKey::Ed25519(key.public_key()).kid();
        assert_eq!(identity.eldest(), Some(kid));
        assert!(identity.has_key(&kid));

        let dh = PublicKey::X25519(X25519KeyPair::from_bytes([3; 32]).public_key());
        let sub = LinkBuilder::new(identity.id(), dh, KeyType::Subkey, kid)
            .prev(link.link_id, 1)
            .build()
            .sign(&key, &RunLog::disabled())
            .unwrap();
        assert_eq!(identity.apply(&sub), BumpResult::Advanced);
        assert_eq!(identity.sibkeys().count(), 1);
        assert_eq!(identity.subkeys().count(), 1);
        assert_eq!(identity.chain().seqno, 2);

        assert_eq!(identity.apply(&sub), BumpResult::Duplicate);
        assert_eq!(identity.keys().len(), 2);

        let dh_kid = dh.kid();
        assert!(identity.can_sign(&kid, 0));
        assert!(!identity.can_sign(&dh_kid, 0));
        let expires_at = identity.keys()[0].expires_at;
        assert!(identity.can_sign(&kid, expires_at - 1));
        assert!(!identity.can_sign(&kid, expires_at));
    }
}
