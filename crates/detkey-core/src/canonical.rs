//! Canonical CBOR encoding for chain statements.
//!
//! Implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 seconds)
//!
//! Link ids and signatures are computed over these bytes, so the same
//! statement must encode identically everywhere.

use ciborium::value::{Integer, Value};

use crate::crypto::KeyId;
use crate::error::CoreError;
use crate::link::{KeyType, Statement, STATEMENT_VERSION};
use crate::types::{IdentityId, LinkId};

/// Statement field keys. Keys 0-23 encode as single bytes.
mod keys {
    pub const VERSION: u64 = 0;
    pub const IDENTITY: u64 = 1;
    pub const KEY_TYPE: u64 = 2;
    pub const PUBLIC_KEY: u64 = 3;
    pub const SIGNING_KID: u64 = 4;
    pub const ELDEST_KID: u64 = 5;
    pub const SEQNO: u64 = 6;
    pub const PREV: u64 = 7;
    pub const CTIME: u64 = 8;
    pub const EXPIRES_AT: u64 = 9;
}

/// Encode a statement to canonical CBOR bytes.
pub fn statement_bytes(statement: &Statement) -> Vec<u8> {
    let value = statement_to_cbor_value(statement);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

fn statement_to_cbor_value(statement: &Statement) -> Value {
    let int = |k: u64| Value::Integer(k.into());
    let prev = match &statement.prev {
        Some(id) => Value::Bytes(id.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (int(keys::VERSION), Value::Integer(statement.version.into())),
        (int(keys::IDENTITY), Value::Bytes(statement.identity.0.to_vec())),
        (int(keys::KEY_TYPE), Value::Integer(statement.key_type.to_u8().into())),
        (
            int(keys::PUBLIC_KEY),
            Value::Bytes(statement.public_key.kid().to_bytes().to_vec()),
        ),
        (
            int(keys::SIGNING_KID),
            Value::Bytes(statement.signing_kid.to_bytes().to_vec()),
        ),
        (
            int(keys::ELDEST_KID),
            Value::Bytes(statement.eldest_kid.to_bytes().to_vec()),
        ),
        (int(keys::SEQNO), Value::Integer(statement.seqno.into())),
        (int(keys::PREV), prev),
        (int(keys::CTIME), Value::Integer(statement.ctime.into())),
        (int(keys::EXPIRES_AT), Value::Integer(statement.expires_at.into())),
    ])
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        // Statements are built only from the variants above.
        _ => unreachable!("unsupported CBOR value in statement"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map with keys sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode a statement, rejecting anything that is not in canonical form.
pub fn decode_statement(bytes: &[u8]) -> Result<Statement, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let statement = cbor_value_to_statement(&value)?;

    if statement_bytes(&statement) != bytes {
        return Err(CoreError::MalformedStatement("non-canonical encoding".into()));
    }
    Ok(statement)
}

fn cbor_value_to_statement(value: &Value) -> Result<Statement, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedStatement("expected map".into())),
    };

    let get = |key: u64| field(map, key);
    let missing = |field: &str| CoreError::MalformedStatement(format!("missing or invalid {field}"));

    let version = int_field(get(keys::VERSION))
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| missing("version"))?;
    if version != STATEMENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let identity = bytes32_field(get(keys::IDENTITY))
        .map(IdentityId)
        .ok_or_else(|| missing("identity"))?;

    let key_type = int_field(get(keys::KEY_TYPE))
        .and_then(|n| u8::try_from(n).ok())
        .and_then(KeyType::from_u8)
        .ok_or_else(|| missing("key_type"))?;

    let public_key = kid_field(get(keys::PUBLIC_KEY), "public_key")?.public_key();
    let signing_kid = kid_field(get(keys::SIGNING_KID), "signing_kid")?;
    let eldest_kid = kid_field(get(keys::ELDEST_KID), "eldest_kid")?;

    let seqno = int_field(get(keys::SEQNO))
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| missing("seqno"))?;

    let prev = match get(keys::PREV) {
        Some(Value::Null) => None,
        other => Some(bytes32_field(other).map(LinkId).ok_or_else(|| missing("prev"))?),
    };

    let ctime = int_field(get(keys::CTIME))
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| missing("ctime"))?;
    let expires_at = int_field(get(keys::EXPIRES_AT))
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| missing("expires_at"))?;

    Ok(Statement {
        version,
        identity,
        key_type,
        public_key,
        signing_kid,
        eldest_kid,
        seqno,
        prev,
        ctime,
        expires_at,
    })
}

fn field(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

fn int_field(value: Option<&Value>) -> Option<i128> {
    match value {
        Some(Value::Integer(i)) => Some(i128::from(*i)),
        _ => None,
    }
}

fn bytes32_field(value: Option<&Value>) -> Option<[u8; 32]> {
    match value {
        Some(Value::Bytes(b)) => b.as_slice().try_into().ok(),
        _ => None,
    }
}

fn kid_field(value: Option<&Value>, field: &str) -> Result<KeyId, CoreError> {
    match value {
        Some(Value::Bytes(b)) => KeyId::from_slice(b),
        _ => Err(CoreError::MalformedStatement(format!(
            "missing or invalid {field}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519KeyPair, PublicKey, X25519KeyPair};
    use crate::link::LinkBuilder;

    fn sample() -> Statement {
        let signer = PublicKey::Ed25519(Ed25519KeyPair::from_seed(&[0x42; 32]).public_key());
        let dh = PublicKey::X25519(X25519KeyPair::from_bytes([0x24; 32]).public_key());
        LinkBuilder::new(IdentityId::derive("alice"), dh, KeyType::Subkey, signer.kid())
            .prev(LinkId::from_bytes([0x11; 32]), 1)
            .ctime(1_736_870_400)
            .build()
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let statement = sample();
        assert_eq!(statement_bytes(&statement), statement_bytes(&statement));
    }

    #[test]
    fn test_statement_roundtrip() {
        let statement = sample();
        let decoded = decode_statement(&statement_bytes(&statement)).unwrap();
        assert_eq!(decoded, statement);
    }

    #[test]
    fn test_bootstrap_statement_roundtrip() {
        let pk = PublicKey::Ed25519(Ed25519KeyPair::from_seed(&[0x01; 32]).public_key());
        let statement = LinkBuilder::new(IdentityId::derive("bob"), pk, KeyType::Sibkey, pk.kid())
            .ctime(-5)
            .build();
        let decoded = decode_statement(&statement_bytes(&statement)).unwrap();
        assert_eq!(decoded.prev, None);
        assert_eq!(decoded.ctime, -5);
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, Integer::from(-1i64));
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);
        assert_eq!(buf, vec![0xa3, 0x00, 0x00, 0x05, 0x18, 50, 0x08, 0x18, 80]);
    }

    #[test]
    fn test_non_canonical_rejected() {
        // Same statement, but with the seqno written in a two-byte form.
        let statement = sample();
        let canonical = statement_bytes(&statement);
        let seqno_pos = canonical
            .windows(3)
            .position(|w| w == [0x06, 0x02, 0x07])
            .unwrap();
        let mut padded = canonical[..seqno_pos + 1].to_vec();
        padded.extend_from_slice(&[0x18, 0x02]);
        padded.extend_from_slice(&canonical[seqno_pos + 2..]);

        assert!(matches!(
            decode_statement(&padded),
            Err(CoreError::MalformedStatement(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut statement = sample();
        statement.version = 9;
        assert!(matches!(
            decode_statement(&statement_bytes(&statement)),
            Err(CoreError::UnsupportedVersion(9))
        ));
    }
}
