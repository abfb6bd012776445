//! Reproducing a published key from its seed and the stored server half.

use detkey_chain::Authority;
use detkey_core::{
    combine, Ed25519KeyPair, KeyDeriver, KeyId, KeyType, PublicKey, RunLog, Seed, ServerHalf,
    X25519KeyPair,
};

use crate::error::{DetKeyError, Result};

async fn server_half<A: Authority + ?Sized>(authority: &A, kid: &KeyId) -> Result<ServerHalf> {
    authority
        .fetch_server_half(kid)
        .await?
        .ok_or(DetKeyError::ServerHalfMissing(*kid))
}

fn check(expected: &KeyId, got: KeyId) -> Result<()> {
    if *expected != got {
        return Err(DetKeyError::KeyMismatch {
            expected: *expected,
            got,
        });
    }
    Ok(())
}

/// Re-derive the signing keypair published as `kid`.
pub async fn rederive_signing<A, D>(
    seed: &Seed,
    kid: &KeyId,
    authority: &A,
    deriver: &D,
    log: &RunLog,
) -> Result<Ed25519KeyPair>
where
    A: Authority + ?Sized,
    D: KeyDeriver + ?Sized,
{
    let key_type = KeyType::Sibkey;
    let half = server_half(authority, kid).await?;
    let input = combine(seed, &half).map_err(|source| DetKeyError::Split { key_type, source })?;
    let keypair = deriver
        .derive_signing(&input, log)
        .map_err(|source| DetKeyError::KeyGeneration { key_type, source })?;

    check(kid, PublicKey::Ed25519(keypair.public_key()).kid())?;
    log.rederived(kid);
    Ok(keypair)
}

/// Re-derive the exchange keypair published as `kid`.
pub async fn rederive_exchange<A, D>(
    seed: &Seed,
    kid: &KeyId,
    authority: &A,
    deriver: &D,
    log: &RunLog,
) -> Result<X25519KeyPair>
where
    A: Authority + ?Sized,
    D: KeyDeriver + ?Sized,
{
    let key_type = KeyType::Subkey;
    let half = server_half(authority, kid).await?;
    let input = combine(seed, &half).map_err(|source| DetKeyError::Split { key_type, source })?;
    let keypair = deriver
        .derive_exchange(&input, log)
        .map_err(|source| DetKeyError::KeyGeneration { key_type, source })?;

    check(kid, PublicKey::X25519(keypair.public_key()).kid())?;
    log.rederived(kid);
    Ok(keypair)
}
