//! Run-scoped logging capability.
//!
//! Each component receives a [`RunLog`] instead of reaching for a global
//! logger. The API only accepts public values: there is no way to hand it a
//! private key or a derivation input.

use std::fmt;

use tracing::Span;

use crate::crypto::{KeyId, PublicKey};
use crate::link::KeyType;
use crate::split::ServerHalf;
use crate::types::{IdentityId, LinkId, SigId};

/// A logging handle scoped to one issuance run.
#[derive(Debug, Clone)]
pub struct RunLog {
    span: Span,
}

impl RunLog {
    /// Open the span for one run over `identity`.
    pub fn new(identity: &IdentityId) -> Self {
        Self {
            span: tracing::info_span!("detkey", identity = %identity),
        }
    }

    /// A handle that records nothing.
    pub fn disabled() -> Self {
        Self { span: Span::none() }
    }

    /// Child handle for the stage issuing one key type.
    pub fn stage(&self, key_type: KeyType) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "stage", key_type = %key_type),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn server_half(&self, half: &ServerHalf) {
        tracing::debug!(parent: &self.span, server_half = %half.to_hex(), "generated server half");
    }

    pub fn public_key(&self, key: &PublicKey) {
        tracing::info!(
            parent: &self.span,
            algorithm = %key.algorithm(),
            public_key = %key.to_hex(),
            "derived keypair"
        );
    }

    pub fn signed(&self, seqno: u64, sig_id: &SigId, link_id: &LinkId) {
        tracing::debug!(
            parent: &self.span,
            seqno,
            sig_id = %sig_id.to_hex(),
            link_id = %link_id.to_hex(),
            "signed chain link"
        );
    }

    pub fn published(&self, seqno: u64, sig_id: &SigId) {
        tracing::info!(parent: &self.span, seqno, sig_id = %sig_id.to_hex(), "chain head advanced");
    }

    pub fn rederived(&self, kid: &KeyId) {
        tracing::debug!(parent: &self.span, kid = %kid, "re-derived published key");
    }

    pub fn duplicate(&self, sig_id: &SigId) {
        tracing::info!(
            parent: &self.span,
            sig_id = %sig_id.to_hex(),
            "link already applied, head unchanged"
        );
    }

    pub fn transition(&self, from: impl fmt::Display, to: impl fmt::Display) {
        tracing::debug!(parent: &self.span, %from, %to, "run state");
    }

    pub fn failed(&self, error: &dyn std::error::Error) {
        tracing::warn!(parent: &self.span, error = %error, "run failed");
    }
}
