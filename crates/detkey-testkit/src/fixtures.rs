//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{CryptoRng, RngCore};

use detkey::{DetKeyConfig, DetKeyEngine, DetKeySeeds, LocalSecretContext};
use detkey_chain::{Identity, MemoryAuthority};
use detkey_core::{
    DerivationInput, Ed25519KeyPair, KeyDeriver, KeyGenerationError, NaclDeriver, RunLog, Seed,
    X25519KeyPair,
};

/// Local secret used by fixtures.
pub const LKS_SECRET: [u8; 32] = [0x5c; 32];

/// A test fixture with an in-memory authority, a fresh identity, and an
/// unlocked local secret.
pub struct TestFixture {
    pub authority: Arc<MemoryAuthority>,
    pub identity: Identity,
    pub ctx: LocalSecretContext,
}

impl TestFixture {
    /// Create a fixture for an identity named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            authority: Arc::new(MemoryAuthority::new()),
            identity: Identity::new(name),
            ctx: LocalSecretContext::loaded(LKS_SECRET),
        }
    }

    /// An engine with the default deriver, publishing to the fixture's authority.
    pub fn engine(&self) -> DetKeyEngine<MemoryAuthority> {
        DetKeyEngine::new(Arc::clone(&self.authority), DetKeyConfig::default())
    }

    /// An engine with a custom deriver.
    pub fn engine_with<D: KeyDeriver>(&self, deriver: D) -> DetKeyEngine<MemoryAuthority, D> {
        DetKeyEngine::with_deriver(Arc::clone(&self.authority), deriver, DetKeyConfig::default())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new("alice")
    }
}

/// Seeds filled with constant bytes.
pub fn seeds(signing: u8, exchange: u8) -> DetKeySeeds {
    DetKeySeeds {
        signing: Seed::from([signing; 32]),
        exchange: Seed::from([exchange; 32]),
    }
}

/// A deriver that counts calls and delegates to [`NaclDeriver`].
///
/// Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct CountingDeriver {
    signing: Arc<AtomicUsize>,
    exchange: Arc<AtomicUsize>,
}

impl CountingDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signing_calls(&self) -> usize {
        self.signing.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange.load(Ordering::SeqCst)
    }
}

impl KeyDeriver for CountingDeriver {
    fn derive_signing(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<Ed25519KeyPair, KeyGenerationError> {
        self.signing.fetch_add(1, Ordering::SeqCst);
        NaclDeriver.derive_signing(input, log)
    }

    fn derive_exchange(
        &self,
        input: &DerivationInput,
        log: &RunLog,
    ) -> Result<X25519KeyPair, KeyGenerationError> {
        self.exchange.fetch_add(1, Ordering::SeqCst);
        NaclDeriver.derive_exchange(input, log)
    }
}

/// A random source that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("FailingRng has no entropy")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("FailingRng has no entropy")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("FailingRng has no entropy")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new("entropy source unavailable"))
    }
}

impl CryptoRng for FailingRng {}

/// A random source that yields one repeated byte. For reproducible server
/// halves in tests only.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRng(pub u8);

impl RngCore for ConstantRng {
    fn next_u32(&mut self) -> u32 {
        u32::from_le_bytes([self.0; 4])
    }

    fn next_u64(&mut self) -> u64 {
        u64::from_le_bytes([self.0; 8])
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(self.0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for ConstantRng {}
