//! Scalar values carried in raw TLV payloads (the "object" field kind).

use crate::error::{KsiError, Result};
use crate::tlv::Tlv;
use std::fmt;
use std::sync::Arc;

/// A value convertible directly to and from a single raw node.
pub trait TlvValue: Sized {
    fn from_tlv(tlv: &Tlv) -> Result<Self>;
    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv>;
}

/// Decode a minimal big-endian unsigned integer of at most 8 bytes. The empty payload is 0.
pub fn decode_uint(raw: &[u8]) -> Result<u64> {
    if raw.len() > 8 {
        return Err(KsiError::invalid_format(format!("integer of {} bytes is larger than 64 bits", raw.len())));
    }
    if raw.first() == Some(&0) {
        return Err(KsiError::invalid_format("integer has a redundant leading zero byte"));
    }
    Ok(raw.iter().fold(0u64, |acc, &b| acc << 8 | b as u64))
}

/// Minimal big-endian encoding; 0 encodes as the empty payload.
pub fn encode_uint(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let skip = (v.leading_zeros() / 8) as usize;
    bytes[skip..].to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Integer(pub u64);

impl Integer {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Integer {
    fn from(v: u64) -> Self {
        Integer(v)
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TlvValue for Integer {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        Ok(Integer(decode_uint(&tlv.raw_value()?)?))
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        Ok(Tlv::raw(tag, non_critical, forward, encode_uint(self.0)))
    }
}

/// Immutable shared byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OctetString(Arc<[u8]>);

impl OctetString {
    pub fn new(data: &[u8]) -> Self {
        OctetString(Arc::from(data))
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

impl From<Vec<u8>> for OctetString {
    fn from(v: Vec<u8>) -> Self {
        OctetString(Arc::from(v))
    }
}

impl TlvValue for OctetString {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        Ok(OctetString::new(&tlv.raw_value()?))
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        Ok(Tlv::raw(tag, non_critical, forward, self.0.to_vec()))
    }
}

/// UTF-8 string; on the wire it is NUL-terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Utf8String(Arc<str>);

impl Utf8String {
    pub fn new(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(KsiError::invalid_argument("string contains a NUL character"));
        }
        Ok(Utf8String(Arc::from(s)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_wire(raw: &[u8]) -> Result<Self> {
        let body = match raw.split_last() {
            Some((&0, body)) => body,
            _ => return Err(KsiError::invalid_format("string value is not NUL-terminated")),
        };
        if body.contains(&0) {
            return Err(KsiError::invalid_format("string value contains an interior NUL byte"));
        }
        let s = std::str::from_utf8(body).map_err(|e| KsiError::invalid_format(format!("invalid UTF-8: {}", e)))?;
        Ok(Utf8String(Arc::from(s)))
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.0.len() + 1);
        v.extend_from_slice(self.0.as_bytes());
        v.push(0);
        v
    }
}

impl fmt::Display for Utf8String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TlvValue for Utf8String {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        Utf8String::from_wire(&tlv.raw_value()?)
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        Ok(Tlv::raw(tag, non_critical, forward, self.to_wire()))
    }
}

/// [`Utf8String`] that must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Utf8StringNz(Utf8String);

impl Utf8StringNz {
    pub fn new(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(KsiError::invalid_argument("empty string value not allowed"));
        }
        Ok(Utf8StringNz(Utf8String::new(s)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TlvValue for Utf8StringNz {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        let s = Utf8String::from_tlv(tlv)?;
        if s.as_str().is_empty() {
            return Err(KsiError::invalid_format("empty string value not allowed"));
        }
        Ok(Utf8StringNz(s))
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        self.0.to_tlv(tag, non_critical, forward)
    }
}

/// Hash algorithms known to the imprint format: (id, name, digest bytes).
const HASH_ALGORITHMS: [(u8, &str, usize); 12] = [
    (0x00, "SHA-1", 20),
    (0x01, "SHA-256", 32),
    (0x02, "RIPEMD-160", 20),
    (0x03, "SHA-224", 28),
    (0x04, "SHA-384", 48),
    (0x05, "SHA-512", 64),
    (0x06, "RIPEMD-256", 32),
    (0x07, "SHA3-224", 28),
    (0x08, "SHA3-256", 32),
    (0x09, "SHA3-384", 48),
    (0x0a, "SHA3-512", 64),
    (0x0b, "SM3", 32),
];

/// Digest length in bytes of hash algorithm `id`.
pub fn hash_digest_len(id: u8) -> Option<usize> {
    HASH_ALGORITHMS.iter().find(|(i, _, _)| *i == id).map(|(_, _, len)| *len)
}

pub fn hash_algorithm_name(id: u8) -> Option<&'static str> {
    HASH_ALGORITHMS.iter().find(|(i, _, _)| *i == id).map(|(_, name, _)| *name)
}

/// Hash imprint: algorithm id byte followed by the digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Imprint {
    algorithm: u8,
    digest: Arc<[u8]>,
}

impl Imprint {
    pub fn new(algorithm: u8, digest: &[u8]) -> Result<Self> {
        let expected = hash_digest_len(algorithm)
            .ok_or_else(|| KsiError::invalid_format(format!("unknown hash algorithm 0x{:02x}", algorithm)))?;
        if digest.len() != expected {
            return Err(KsiError::invalid_format(format!(
                "{} digest must be {} bytes, got {}",
                hash_algorithm_name(algorithm).unwrap_or("hash"),
                expected,
                digest.len()
            )));
        }
        Ok(Imprint { algorithm, digest: Arc::from(digest) })
    }

    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}

impl TlvValue for Imprint {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        let raw = tlv.raw_value()?;
        match raw.split_first() {
            Some((&algorithm, digest)) => Imprint::new(algorithm, digest),
            None => Err(KsiError::invalid_format("empty imprint")),
        }
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        let mut v = Vec::with_capacity(self.digest.len() + 1);
        v.push(self.algorithm);
        v.extend_from_slice(&self.digest);
        Ok(Tlv::raw(tag, non_critical, forward, v))
    }
}

/// Opaque passthrough: the node itself, retagged on encode.
impl TlvValue for Tlv {
    fn from_tlv(tlv: &Tlv) -> Result<Self> {
        Ok(tlv.clone())
    }

    fn to_tlv(&self, tag: u16, non_critical: bool, forward: bool) -> Result<Tlv> {
        let mut t = self.clone();
        t.set_tag(tag);
        t.set_non_critical(non_critical);
        t.set_forward(forward);
        Ok(t)
    }
}
