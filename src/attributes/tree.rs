//! The decoded attribute value tree and the codec that produces it from the wire format.

use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::record::WireAttributeValue;

/// A scalar value as it appears inside a set (`SS`/`NS`/`BS`). Sets hold only scalars, never
/// nested trees, so they get their own smaller type rather than reusing [`AttributeTree`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    Str(String),
    Number(NumberValue),
    Binary(Vec<u8>),
}

/// A DynamoDB `N` value: integers are coerced to `i64` when that round-trips losslessly;
/// everything else (decimals, exponents, values outside `i64` range) is kept as the original
/// string so no precision is silently dropped.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumberValue {
    Int(i64),
    Raw(String),
}

impl NumberValue {
    pub fn parse(raw: &str) -> NumberValue {
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => NumberValue::Int(n),
            _ => NumberValue::Raw(raw.to_string()),
        }
    }
}

impl Scalar {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Str(s) => serde_json::Value::String(s.clone()),
            Scalar::Number(NumberValue::Int(n)) => serde_json::Value::Number((*n).into()),
            Scalar::Number(NumberValue::Raw(raw)) => serde_json::Value::String(raw.clone()),
            Scalar::Binary(bytes) => serde_json::Value::String(encode_base64(bytes)),
        }
    }
}

/// A decoded attribute value tree. Two trees are structurally equal (via `PartialEq`) iff the
/// wire forms they were decoded from are semantically equal.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeTree {
    /// The wire's explicit `NULL` scalar — distinct from a key being absent entirely.
    Null,
    Str(String),
    Number(NumberValue),
    Bool(bool),
    Binary(Vec<u8>),
    List(Vec<AttributeTree>),
    Map(BTreeMap<String, AttributeTree>),
    /// An unordered bag of scalars (`SS`/`NS`/`BS`). Compared as a multiset: order never
    /// matters, duplicates are collapsed (DynamoDB sets have no duplicate elements).
    Set(Vec<Scalar>),
}

impl AttributeTree {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeTree::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttributeTree>> {
        match self {
            AttributeTree::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeTree]> {
        match self {
            AttributeTree::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeTree::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render this tree as a `serde_json::Value`, for payloads (the deferral queue message's
    /// `keys`) that need a plain JSON representation rather than the typed tree. Binary values
    /// are re-encoded as base64 strings, matching the wire form they were decoded from.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeTree::Null => serde_json::Value::Null,
            AttributeTree::Str(s) => serde_json::Value::String(s.clone()),
            AttributeTree::Number(NumberValue::Int(n)) => serde_json::Value::Number((*n).into()),
            AttributeTree::Number(NumberValue::Raw(raw)) => serde_json::Value::String(raw.clone()),
            AttributeTree::Bool(b) => serde_json::Value::Bool(*b),
            AttributeTree::Binary(bytes) => serde_json::Value::String(encode_base64(bytes)),
            AttributeTree::List(items) => serde_json::Value::Array(items.iter().map(AttributeTree::to_json).collect()),
            AttributeTree::Map(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            AttributeTree::Set(scalars) => serde_json::Value::Array(scalars.iter().map(Scalar::to_json).collect()),
        }
    }

    /// Decode a wire attribute map into the canonical tree, one entry per top-level key.
    pub fn decode_map(
        wire: &std::collections::HashMap<String, WireAttributeValue>,
    ) -> Result<BTreeMap<String, AttributeTree>, DecodeError> {
        wire.iter()
            .map(|(k, v)| Ok((k.clone(), AttributeTree::decode(v)?)))
            .collect()
    }

    /// Decode a single tagged wire scalar/collection into an [`AttributeTree`].
    pub fn decode(wire: &WireAttributeValue) -> Result<AttributeTree, DecodeError> {
        Ok(match wire {
            WireAttributeValue::Null(_) => AttributeTree::Null,
            WireAttributeValue::S(s) => AttributeTree::Str(s.clone()),
            WireAttributeValue::N(raw) => AttributeTree::Number(NumberValue::parse(raw)),
            WireAttributeValue::Bool(b) => AttributeTree::Bool(*b),
            WireAttributeValue::B(raw) => {
                AttributeTree::Binary(decode_base64(raw).map_err(|reason| {
                    DecodeError::Malformed {
                        path: "<B>".to_string(),
                        reason,
                    }
                })?)
            }
            WireAttributeValue::L(items) => {
                let decoded: Result<Vec<_>, _> =
                    items.iter().map(AttributeTree::decode).collect();
                AttributeTree::List(decoded?)
            }
            WireAttributeValue::M(map) => AttributeTree::Map(AttributeTree::decode_map(map)?),
            WireAttributeValue::Ss(items) => {
                AttributeTree::Set(items.iter().cloned().map(Scalar::Str).collect())
            }
            WireAttributeValue::Ns(items) => AttributeTree::Set(
                items
                    .iter()
                    .map(|n| Scalar::Number(NumberValue::parse(n)))
                    .collect(),
            ),
            WireAttributeValue::Bs(items) => {
                let decoded: Result<Vec<_>, String> = items.iter().map(|raw| decode_base64(raw)).collect();
                let decoded = decoded.map_err(|reason| DecodeError::Malformed {
                    path: "<BS>".to_string(),
                    reason,
                })?;
                AttributeTree::Set(decoded.into_iter().map(Scalar::Binary).collect())
            }
        })
    }
}

/// Minimal base64 decoder (standard alphabet, `=` padding) so the codec has no external
/// dependency solely for decoding the `B`/`BS` wire tags.
fn decode_base64(input: &str) -> Result<Vec<u8>, String> {
    fn value(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let trimmed = input.trim_end_matches('=');
    let mut out = Vec::with_capacity(trimmed.len() * 3 / 4 + 3);
    let mut buf: u32 = 0;
    let mut bits = 0;
    for c in trimmed.bytes() {
        let v = value(c).ok_or_else(|| format!("invalid base64 byte: {c}"))?;
        buf = (buf << 6) | v as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buf >> bits) as u8);
        }
    }
    Ok(out)
}

/// Minimal base64 encoder (standard alphabet, `=` padding), the inverse of [`decode_base64`].
fn encode_base64(input: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();

        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        out.push(if let Some(b1) = b1 {
            ALPHABET[(((b1 & 0x0f) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if let Some(b2) = b2 {
            ALPHABET[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}
