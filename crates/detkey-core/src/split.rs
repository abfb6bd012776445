//! Seed splitting: combining a caller seed with a fresh random server half.
//!
//! The derivation input is `seed XOR server_half`. The seed stays with the
//! caller and the server half is kept by the authority, so neither party can
//! rebuild the derivation input alone.

use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::SplitError;
use crate::log::RunLog;

/// Seed length for both Ed25519 and X25519 derivation.
pub const SEED_LEN: usize = 32;

/// A cryptographically secure randomness source usable behind `dyn`.
pub trait EntropySource: RngCore + CryptoRng + Send + Sync {}

impl<T: RngCore + CryptoRng + Send + Sync> EntropySource for T {}

/// Caller-supplied deterministic secret material. Consumed once per run.
pub struct Seed(Zeroizing<Vec<u8>>);

impl Seed {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<[u8; SEED_LEN]> for Seed {
    fn from(bytes: [u8; SEED_LEN]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({} bytes)", self.len())
    }
}

/// The random half held by the authority.
///
/// Safe to log and transmit; useless without the seed.
pub struct ServerHalf(Zeroizing<Vec<u8>>);

impl ServerHalf {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self::from_bytes(hex::decode(s)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&*self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Clone for ServerHalf {
    fn clone(&self) -> Self {
        Self::from_bytes(self.as_bytes().to_vec())
    }
}

impl PartialEq for ServerHalf {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ServerHalf {}

impl fmt::Debug for ServerHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerHalf({})", self.to_hex())
    }
}

/// `seed XOR server_half`. The only value ever fed to key generation.
pub struct DerivationInput(Zeroizing<Vec<u8>>);

impl DerivationInput {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DerivationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivationInput({} bytes)", self.len())
    }
}

/// Generate a fresh server half of the seed's length and combine it with the seed.
pub fn split<R>(
    seed: &Seed,
    rng: &mut R,
    log: &RunLog,
) -> Result<(DerivationInput, ServerHalf), SplitError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut half = Zeroizing::new(vec![0u8; seed.len()]);
    rng.try_fill_bytes(&mut half)
        .map_err(|e| SplitError::RandomSource(e.to_string()))?;
    let server_half = ServerHalf(half);

    let input = combine(seed, &server_half)?;
    log.server_half(&server_half);
    Ok((input, server_half))
}

/// Rebuild the derivation input from a seed and a previously issued server half.
pub fn combine(seed: &Seed, server_half: &ServerHalf) -> Result<DerivationInput, SplitError> {
    let mut out = Zeroizing::new(vec![0u8; seed.len()]);
    xor_bytes(&mut out, seed.as_bytes(), server_half.as_bytes())?;
    Ok(DerivationInput(out))
}

/// `dst[i] = a[i] ^ b[i]`. All three buffers must have the same length.
pub fn xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) -> Result<(), SplitError> {
    if a.len() != b.len() {
        return Err(SplitError::LengthMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    if dst.len() != a.len() {
        return Err(SplitError::LengthMismatch {
            expected: a.len(),
            got: dst.len(),
        });
    }
    for ((d, x), y) in dst.iter_mut().zip(a).zip(b) {
        *d = x ^ y;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct EmptyRng;

    impl RngCore for EmptyRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy pool exhausted"))
        }
    }

    impl CryptoRng for EmptyRng {}

    #[test]
    fn test_golden_xor() {
        let seed = Seed::from([0x00; 32]);
        let half = ServerHalf::from_bytes(vec![0x01; 32]);
        let input = combine(&seed, &half).unwrap();
        assert_eq!(input.as_bytes(), &[0x01; 32]);
    }

    #[test]
    fn test_split_lengths_match_seed() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [16, 32, 64] {
            let seed = Seed::new(vec![0xaa; len]);
            let (input, half) = split(&seed, &mut rng, &RunLog::disabled()).unwrap();
            assert_eq!(input.len(), len);
            assert_eq!(half.len(), len);
        }
    }

    #[test]
    fn test_split_then_combine_agrees() {
        let mut rng = StdRng::seed_from_u64(11);
        let seed = Seed::from([0x5c; 32]);
        let (input, half) = split(&seed, &mut rng, &RunLog::disabled()).unwrap();
        let again = combine(&seed, &half).unwrap();
        assert_eq!(input.as_bytes(), again.as_bytes());
    }

    #[test]
    fn test_split_draws_fresh_halves() {
        let mut rng = StdRng::seed_from_u64(3);
        let seed = Seed::from([0x00; 32]);
        let (a, half_a) = split(&seed, &mut rng, &RunLog::disabled()).unwrap();
        let (b, half_b) = split(&seed, &mut rng, &RunLog::disabled()).unwrap();
        assert_ne!(half_a, half_b);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_random_source_failure() {
        let seed = Seed::from([0x01; 32]);
        let err = split(&seed, &mut EmptyRng, &RunLog::disabled()).unwrap_err();
        assert!(matches!(err, SplitError::RandomSource(_)));
    }

    #[test]
    fn test_length_mismatch() {
        let seed = Seed::from([0x01; 32]);
        let half = ServerHalf::from_bytes(vec![0x02; 31]);
        let err = combine(&seed, &half).unwrap_err();
        assert!(matches!(
            err,
            SplitError::LengthMismatch {
                expected: 32,
                got: 31
            }
        ));
    }

    #[test]
    fn test_debug_redacts_secret_material() {
        let seed = Seed::from([0x77; 32]);
        let half = ServerHalf::from_bytes(vec![0x00; 32]);
        let input = combine(&seed, &half).unwrap();
        assert_eq!(format!("{:?}", seed), "Seed(32 bytes)");
        assert_eq!(format!("{:?}", input), "DerivationInput(32 bytes)");
    }

    proptest! {
        #[test]
        fn xor_roundtrip(pair in (1usize..96).prop_flat_map(|n| (
            prop::collection::vec(any::<u8>(), n),
            prop::collection::vec(any::<u8>(), n),
        ))) {
            let (seed, half) = pair;
            let mut mixed = vec![0u8; seed.len()];
            xor_bytes(&mut mixed, &seed, &half).unwrap();
            let mut back = vec![0u8; seed.len()];
            xor_bytes(&mut back, &mixed, &half).unwrap();
            prop_assert_eq!(back, seed);
        }

        #[test]
        fn distinct_halves_give_distinct_inputs(
            seed in any::<[u8; 32]>(),
            r1 in any::<[u8; 32]>(),
            r2 in any::<[u8; 32]>(),
        ) {
            prop_assume!(r1 != r2);
            let seed = Seed::from(seed);
            let a = combine(&seed, &ServerHalf::from_bytes(r1.to_vec())).unwrap();
            let b = combine(&seed, &ServerHalf::from_bytes(r2.to_vec())).unwrap();
            prop_assert_ne!(a.as_bytes(), b.as_bytes());
        }
    }
}
