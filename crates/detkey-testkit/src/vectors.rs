//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the public keys derived from one derivation input, so
//! any implementation of the derivation can be checked against them.

use detkey_core::{
    combine, KeyDeriver, NaclDeriver, PublicKey, RunLog, Seed, ServerHalf, SEED_LEN,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Derivation input (seed XOR server half).
    pub input: [u8; SEED_LEN],
    /// Expected Ed25519 public key (hex).
    pub ed25519_public: &'static str,
    /// Expected X25519 public key (hex).
    pub x25519_public: &'static str,
}

fn descending() -> [u8; SEED_LEN] {
    let mut input = [0u8; SEED_LEN];
    for (i, b) in input.iter_mut().enumerate() {
        *b = (i as u8) ^ 0xff;
    }
    input
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "all 0x01",
            input: [0x01; SEED_LEN],
            ed25519_public: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c",
            x25519_public: "a4e09292b651c278b9772c569f5fa9bb13d906b46ab68c9df9dc2b4409f8a209",
        },
        GoldenVector {
            name: "all 0x42",
            input: [0x42; SEED_LEN],
            ed25519_public: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            x25519_public: "132c442be010fbd57e72603328aa76e71fccc1503aae219327d14d9c9993f472",
        },
        GoldenVector {
            name: "descending from 0xff",
            input: descending(),
            ed25519_public: "bafc71bead3ac5e4b63e9c8216ee71a34aaec65722eedbca728b4e9b3ccce396",
            x25519_public: "3ebcb692149344dc54e58160cf90bed9eea1dd14e81c8e91de557af7d7afd915",
        },
    ]
}

/// Derive both public keys for a vector's input.
///
/// The input is fed as a seed with an all-zero server half, which leaves it
/// unchanged.
pub fn derive_from_vector(vector: &GoldenVector) -> (PublicKey, PublicKey) {
    let log = RunLog::disabled();
    let zero = ServerHalf::from_bytes(vec![0u8; SEED_LEN]);
    let input = combine(&Seed::from(vector.input), &zero).expect("equal lengths");

    let signing = NaclDeriver
        .derive_signing(&input, &log)
        .expect("32-byte input");
    let exchange = NaclDeriver
        .derive_exchange(&input, &log)
        .expect("32-byte input");
    (
        PublicKey::Ed25519(signing.public_key()),
        PublicKey::X25519(exchange.public_key()),
    )
}

/// Verify all golden vectors against the default deriver.
///
/// Returns `(name, matches, ed25519 hex, x25519 hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let (signing, exchange) = derive_from_vector(v);
            let (ed, x) = (signing.to_hex(), exchange.to_hex());
            let matches = ed == v.ed25519_public && x == v.x25519_public;
            (v.name.to_string(), matches, ed, x)
        })
        .collect()
}
