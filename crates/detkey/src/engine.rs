//! The issuance engine: signing key first, then exchange key.
//!
//! Each stage splits its seed, derives a keypair, signs a chain link for the
//! new key, seals the private key under the local secret, and publishes the
//! link. A failed stage stops the run: the exchange stage never starts if
//! the signing stage failed, and keys already published stay published.

use std::fmt;
use std::sync::Arc;

use rand::rngs::OsRng;

use detkey_chain::{
    Authority, ChainPublisher, Identity, PostRecord, PublishOutcome, PublisherConfig,
};
use detkey_core::{
    split, ChainLink, EntropySource, KeyDeriver, KeyId, KeyType, LinkBuilder, LinkId,
    NaclDeriver, PublicKey, RunLog, Seed, ServerHalf, SigId, SigningError, Statement,
    StatementSigner, DEFAULT_EXPIRE_SECS,
};

use crate::context::{LocalSecretContext, SealedKey};
use crate::error::{DetKeyError, Result};

/// Configuration for issuance runs.
#[derive(Debug, Clone)]
pub struct DetKeyConfig {
    /// Lifetime of issued signing keys, in seconds.
    pub signing_expire_secs: u64,
    /// Lifetime of issued exchange keys, in seconds.
    pub exchange_expire_secs: u64,
    /// Publisher configuration.
    pub publisher: PublisherConfig,
    /// Fixed statement creation time in Unix seconds. Wall clock when `None`.
    pub ctime: Option<i64>,
}

impl Default for DetKeyConfig {
    fn default() -> Self {
        Self {
            signing_expire_secs: DEFAULT_EXPIRE_SECS,
            exchange_expire_secs: DEFAULT_EXPIRE_SECS,
            publisher: PublisherConfig::default(),
            ctime: None,
        }
    }
}

/// The two caller-supplied seeds for one run.
#[derive(Debug)]
pub struct DetKeySeeds {
    pub signing: Seed,
    pub exchange: Seed,
}

/// Progress of the current or most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing issued yet.
    Start,
    /// The signing key is published.
    SigningDerived,
    /// Both keys are published.
    ExchangeDerived,
    /// A stage failed; the run is over.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Start => "start",
            RunState::SigningDerived => "signing_derived",
            RunState::ExchangeDerived => "exchange_derived",
            RunState::Failed => "failed",
        })
    }
}

/// A key issued and published by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub kid: KeyId,
    pub key_type: KeyType,
    pub public_key: PublicKey,
    pub sig_id: SigId,
    pub link_id: LinkId,
    /// Chain position of the link that added the key.
    pub seqno: u64,
    /// The private key, sealed under the local secret.
    pub sealed: SealedKey,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetKeyOutcome {
    pub signing: IssuedKey,
    pub exchange: IssuedKey,
}

/// Issues a deterministic signing key and exchange key for an identity.
pub struct DetKeyEngine<A: Authority, D: KeyDeriver = NaclDeriver> {
    publisher: ChainPublisher<A>,
    deriver: D,
    rng: Box<dyn EntropySource>,
    config: DetKeyConfig,
    state: RunState,
}

impl<A: Authority> DetKeyEngine<A, NaclDeriver> {
    /// Create an engine with the default deriver and the OS random source.
    pub fn new(authority: Arc<A>, config: DetKeyConfig) -> Self {
        Self::with_deriver(authority, NaclDeriver, config)
    }
}

impl<A: Authority, D: KeyDeriver> DetKeyEngine<A, D> {
    /// Create an engine with a custom deriver.
    pub fn with_deriver(authority: Arc<A>, deriver: D, config: DetKeyConfig) -> Self {
        Self {
            publisher: ChainPublisher::new(authority, config.publisher.clone()),
            deriver,
            rng: Box::new(OsRng),
            config,
            state: RunState::Start,
        }
    }

    /// Replace the random source used for server halves and seal nonces.
    pub fn with_rng(mut self, rng: impl EntropySource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn authority(&self) -> &Arc<A> {
        self.publisher.authority()
    }

    pub fn deriver(&self) -> &D {
        &self.deriver
    }

    pub fn config(&self) -> &DetKeyConfig {
        &self.config
    }

    /// State of the current or most recent run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Issue and publish the signing key, then the exchange key.
    ///
    /// `signer` must be an unexpired sibkey of the identity. With no signer
    /// the identity is bootstrapped, which requires an empty chain: the new
    /// signing key signs its own link and then the exchange key's link. On
    /// error, [`DetKeyError::key_type`] names the stage that failed.
    pub async fn run(
        &mut self,
        ctx: &LocalSecretContext,
        identity: &mut Identity,
        signer: Option<&dyn StatementSigner>,
        seeds: DetKeySeeds,
    ) -> Result<DetKeyOutcome> {
        let log = RunLog::new(&identity.id());
        self.transition(&log, RunState::Start);

        match self.run_stages(ctx, identity, signer, &seeds, &log).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log.failed(&e);
                self.transition(&log, RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &mut self,
        ctx: &LocalSecretContext,
        identity: &mut Identity,
        signer: Option<&dyn StatementSigner>,
        seeds: &DetKeySeeds,
        log: &RunLog,
    ) -> Result<DetKeyOutcome> {
        let ctime = self.config.ctime.unwrap_or_else(now_secs);

        // Signing key
        let key_type = KeyType::Sibkey;
        authorize(identity, signer, ctime)
            .map_err(|source| DetKeyError::Signing { key_type, source })?;
        let stage = log.stage(key_type);
        let (input, server_half) = split(&seeds.signing, &mut *self.rng, &stage)
            .map_err(|source| DetKeyError::Split { key_type, source })?;
        let signing_key = self
            .deriver
            .derive_signing(&input, &stage)
            .map_err(|source| DetKeyError::KeyGeneration { key_type, source })?;
        drop(input);

        let public_key = PublicKey::Ed25519(signing_key.public_key());
        let signer: &dyn StatementSigner = match signer {
            Some(signer) => signer,
            None => &signing_key,
        };
        let statement = self.statement(identity, public_key, key_type, signer.key_id(), ctime);
        let link = statement
            .sign(signer, &stage)
            .map_err(|source| DetKeyError::Signing { key_type, source })?;
        let sealed = ctx.seal(public_key.kid(), &signing_key.secret_bytes()[..], &mut *self.rng)?;
        let signing = self
            .commit(identity, &link, &server_half, sealed, &stage)
            .await?;
        self.transition(log, RunState::SigningDerived);

        // Exchange key
        let key_type = KeyType::Subkey;
        let stage = log.stage(key_type);
        let (input, server_half) = split(&seeds.exchange, &mut *self.rng, &stage)
            .map_err(|source| DetKeyError::Split { key_type, source })?;
        let exchange_key = self
            .deriver
            .derive_exchange(&input, &stage)
            .map_err(|source| DetKeyError::KeyGeneration { key_type, source })?;
        drop(input);

        let public_key = PublicKey::X25519(exchange_key.public_key());
        let statement = self.statement(identity, public_key, key_type, signer.key_id(), ctime);
        let link = statement
            .sign(signer, &stage)
            .map_err(|source| DetKeyError::Signing { key_type, source })?;
        let sealed = ctx.seal(public_key.kid(), &exchange_key.secret_bytes()[..], &mut *self.rng)?;
        let exchange = self
            .commit(identity, &link, &server_half, sealed, &stage)
            .await?;
        self.transition(log, RunState::ExchangeDerived);

        Ok(DetKeyOutcome { signing, exchange })
    }

    /// Build the statement adding `public_key` on top of the identity's head.
    fn statement(
        &self,
        identity: &Identity,
        public_key: PublicKey,
        key_type: KeyType,
        signing_kid: KeyId,
        ctime: i64,
    ) -> Statement {
        let expire = match key_type {
            KeyType::Sibkey => self.config.signing_expire_secs,
            KeyType::Subkey => self.config.exchange_expire_secs,
        };
        let builder = LinkBuilder::new(identity.id(), public_key, key_type, signing_kid)
            .eldest(identity.eldest().unwrap_or(signing_kid))
            .ctime(ctime)
            .expire_in(expire);

        let head = identity.chain();
        match head.link_id {
            Some(prev) => builder.prev(prev, head.seqno),
            None => builder,
        }
        .build()
    }

    async fn commit(
        &self,
        identity: &mut Identity,
        link: &ChainLink,
        server_half: &ServerHalf,
        sealed: SealedKey,
        log: &RunLog,
    ) -> Result<IssuedKey> {
        let key_type = link.statement.key_type;
        let record = PostRecord::new(link, server_half);
        let outcome: PublishOutcome = self
            .publisher
            .publish(identity, &record, log)
            .await
            .map_err(|source| DetKeyError::Publish {
                key_type,
                record: Box::new(record.clone()),
                source,
            })?;

        Ok(IssuedKey {
            kid: link.statement.public_key.kid(),
            key_type,
            public_key: link.statement.public_key,
            sig_id: link.sig_id,
            link_id: link.link_id,
            seqno: outcome.seqno(),
            sealed,
        })
    }

    fn transition(&mut self, log: &RunLog, to: RunState) {
        log.transition(self.state, to);
        self.state = to;
    }
}

/// Check that `signer` may extend the identity's chain at `at`.
fn authorize(
    identity: &Identity,
    signer: Option<&dyn StatementSigner>,
    at: i64,
) -> std::result::Result<(), SigningError> {
    match signer {
        None if identity.chain().seqno == 0 => Ok(()),
        None => Err(SigningError::SignerRequired),
        Some(signer) => {
            let kid = signer.key_id();
            if identity.can_sign(&kid, at) {
                Ok(())
            } else {
                Err(SigningError::NotAuthorized(kid))
            }
        }
    }
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use detkey_chain::MemoryAuthority;

    fn seeds() -> DetKeySeeds {
        DetKeySeeds {
            signing: Seed::from([0x11; 32]),
            exchange: Seed::from([0x22; 32]),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = DetKeyConfig::default();
        assert_eq!(config.signing_expire_secs, 315_360_000);
        assert_eq!(config.exchange_expire_secs, 315_360_000);
        assert_eq!(config.ctime, None);
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Start.to_string(), "start");
        assert_eq!(RunState::ExchangeDerived.to_string(), "exchange_derived");
    }

    #[tokio::test]
    async fn test_bootstrap_run() {
        let authority = Arc::new(MemoryAuthority::new());
        let mut engine = DetKeyEngine::new(Arc::clone(&authority), DetKeyConfig::default());
        let ctx = LocalSecretContext::loaded([9; 32]);
        let mut identity = Identity::new("alice");

        let outcome = engine
            .run(&ctx, &mut identity, None, seeds())
            .await
            .unwrap();

        assert_eq!(engine.state(), RunState::ExchangeDerived);
        assert_eq!(outcome.signing.seqno, 1);
        assert_eq!(outcome.exchange.seqno, 2);
        assert_eq!(identity.eldest(), Some(outcome.signing.kid));
        assert_eq!(identity.chain().sig_id, Some(outcome.exchange.sig_id));
        assert_eq!(authority.head(&identity.id()).unwrap().seqno, 2);
    }

    #[tokio::test]
    async fn test_expiry_follows_config() {
        let authority = Arc::new(MemoryAuthority::new());
        let config = DetKeyConfig {
            signing_expire_secs: 100,
            exchange_expire_secs: 50,
            ctime: Some(1_000),
            ..DetKeyConfig::default()
        };
        let mut engine = DetKeyEngine::new(authority, config);
        let ctx = LocalSecretContext::loaded([9; 32]);
        let mut identity = Identity::new("alice");
        engine
            .run(&ctx, &mut identity, None, seeds())
            .await
            .unwrap();

        let keys = identity.keys();
        assert_eq!(keys[0].expires_at, 1_100);
        assert_eq!(keys[1].expires_at, 1_050);
    }
}
