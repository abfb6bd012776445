//! Proptest generators for property-based testing.

use proptest::prelude::*;

use detkey_core::{Ed25519KeyPair, KeyType, LinkId, Seed, ServerHalf, SEED_LEN};

/// Generate raw seed bytes.
pub fn seed_bytes() -> impl Strategy<Value = [u8; SEED_LEN]> {
    any::<[u8; SEED_LEN]>()
}

/// Generate a seed.
pub fn seed() -> impl Strategy<Value = Seed> {
    seed_bytes().prop_map(Seed::from)
}

/// Generate a server half of the standard length.
pub fn server_half() -> impl Strategy<Value = ServerHalf> {
    seed_bytes().prop_map(|bytes| ServerHalf::from_bytes(bytes.to_vec()))
}

/// Generate a seed of arbitrary length, including empty.
pub fn any_length_seed(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a random signing keypair.
pub fn keypair() -> impl Strategy<Value = Ed25519KeyPair> {
    seed_bytes().prop_map(|seed| Ed25519KeyPair::from_seed(&seed))
}

/// Generate a random LinkId.
pub fn link_id() -> impl Strategy<Value = LinkId> {
    any::<[u8; 32]>().prop_map(LinkId::from_bytes)
}

/// Generate a KeyType.
pub fn key_type() -> impl Strategy<Value = KeyType> {
    prop_oneof![Just(KeyType::Sibkey), Just(KeyType::Subkey)]
}

/// Generate an identity name.
pub fn identity_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}
