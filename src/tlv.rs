//! Binary node: a tag, the non-critical/forward flags and either raw bytes or child nodes.
//!
//! Nodes parsed from bytes start out raw; their payload is interpreted as a child sequence
//! only when asked for ([`Tlv::children`]), so a node is composite or primitive purely by
//! how the template uses it.

use crate::error::{KsiError, Result};
use crate::walk::{TlvHeader, TlvWalker, WalkItem};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone)]
pub enum Payload {
    Raw(Vec<u8>),
    Nested(Vec<Tlv>),
}

#[derive(Debug, Clone)]
pub struct Tlv {
    tag: u16,
    non_critical: bool,
    forward: bool,
    payload: Payload,
    /// Absolute offset of the header in the source stream (0 for constructed nodes).
    offset: usize,
    header_len: usize,
}

impl Tlv {
    /// Empty raw node.
    pub fn new(tag: u16, non_critical: bool, forward: bool) -> Self {
        Self::raw(tag, non_critical, forward, Vec::new())
    }

    pub fn raw(tag: u16, non_critical: bool, forward: bool, value: Vec<u8>) -> Self {
        Tlv { tag, non_critical, forward, payload: Payload::Raw(value), offset: 0, header_len: 0 }
    }

    pub fn nested(tag: u16, non_critical: bool, forward: bool, children: Vec<Tlv>) -> Self {
        Tlv { tag, non_critical, forward, payload: Payload::Nested(children), offset: 0, header_len: 0 }
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u16) {
        self.tag = tag;
    }

    pub fn is_non_critical(&self) -> bool {
        self.non_critical
    }

    pub fn set_non_critical(&mut self, v: bool) {
        self.non_critical = v;
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn set_forward(&mut self, v: bool) {
        self.forward = v;
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.payload, Payload::Nested(_))
    }

    /// Absolute byte offset of this node's header in the stream it was parsed from.
    pub fn absolute_offset(&self) -> usize {
        self.offset
    }

    /// Header length as it appeared on the wire; 0 for constructed nodes.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Raw payload bytes; a nested node yields its serialised children.
    pub fn raw_value(&self) -> Result<Cow<'_, [u8]>> {
        match &self.payload {
            Payload::Raw(v) => Ok(Cow::Borrowed(v.as_slice())),
            Payload::Nested(children) => {
                let mut out = Vec::new();
                for c in children {
                    c.write_to(&mut out)?;
                }
                Ok(Cow::Owned(out))
            }
        }
    }

    pub fn set_raw_value(&mut self, value: Vec<u8>) {
        self.payload = Payload::Raw(value);
    }

    /// Child nodes in document order; a raw payload is parsed on demand.
    pub fn children(&self) -> Result<Cow<'_, [Tlv]>> {
        match &self.payload {
            Payload::Nested(children) => Ok(Cow::Borrowed(children.as_slice())),
            Payload::Raw(raw) => {
                let base = self.offset + self.header_len;
                let children = TlvWalker::with_base(raw, base)
                    .map(|item| item.map(Tlv::from_walk_item))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| e.at(format_args!("TLV[0x{:02x}] is not a composite", self.tag)))?;
                Ok(Cow::Owned(children))
            }
        }
    }

    /// Append a child, turning an empty raw node into a nested one.
    pub fn append_child(&mut self, child: Tlv) -> Result<()> {
        if let Payload::Raw(raw) = &self.payload {
            let existing = if raw.is_empty() { Vec::new() } else { self.children()?.into_owned() };
            self.payload = Payload::Nested(existing);
        }
        if let Payload::Nested(children) = &mut self.payload {
            children.push(child);
        }
        Ok(())
    }

    pub fn into_children(self) -> Result<Vec<Tlv>> {
        match self.payload {
            Payload::Nested(children) => Ok(children),
            Payload::Raw(_) => self.children().map(Cow::into_owned),
        }
    }

    /// Parse exactly one TLV; trailing bytes are an error.
    pub fn parse(bytes: &[u8]) -> Result<Tlv> {
        let (tlv, used) = Self::parse_prefix(bytes)?;
        if used != bytes.len() {
            return Err(KsiError::invalid_format(format!(
                "{} trailing bytes after TLV[0x{:02x}]",
                bytes.len() - used,
                tlv.tag
            )));
        }
        Ok(tlv)
    }

    /// Parse the TLV at the start of `bytes`, returning it and the number of bytes used.
    pub fn parse_prefix(bytes: &[u8]) -> Result<(Tlv, usize)> {
        Self::parse_prefix_at(bytes, 0)
    }

    /// As [`Tlv::parse_prefix`], with offsets reported relative to `base`.
    pub fn parse_prefix_at(bytes: &[u8], base: usize) -> Result<(Tlv, usize)> {
        match TlvWalker::with_base(bytes, base).next() {
            Some(Ok(item)) => {
                let used = item.header.total_len();
                Ok((Tlv::from_walk_item(item), used))
            }
            Some(Err(e)) => Err(e),
            None => Err(KsiError::invalid_format("empty input")),
        }
    }

    pub(crate) fn from_parts(header: TlvHeader, payload: Vec<u8>, offset: usize) -> Tlv {
        Tlv {
            tag: header.tag,
            non_critical: header.non_critical,
            forward: header.forward,
            payload: Payload::Raw(payload),
            offset,
            header_len: header.header_len,
        }
    }

    fn from_walk_item(item: WalkItem<'_>) -> Tlv {
        Tlv::from_parts(item.header, item.payload.to_vec(), item.offset)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let payload = self.raw_value()?;
        let header = TlvHeader::for_payload(self.tag, self.non_critical, self.forward, payload.len())
            .map_err(|e| e.at(format_args!("TLV[0x{:02x}]", self.tag)))?;
        header.write(out);
        out.extend_from_slice(&payload);
        Ok(())
    }
}

/// Structural equality: tag, flags and payload. Offsets are ignored.
///
/// Two nested nodes compare child by child; a raw node equals a nested one when the nested
/// children serialise to exactly its bytes.
impl PartialEq for Tlv {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag || self.non_critical != other.non_critical || self.forward != other.forward {
            return false;
        }
        match (&self.payload, &other.payload) {
            (Payload::Raw(a), Payload::Raw(b)) => a == b,
            (Payload::Nested(a), Payload::Nested(b)) => a == b,
            (Payload::Raw(raw), Payload::Nested(_)) => other.raw_value().map_or(false, |v| v.as_ref() == raw.as_slice()),
            (Payload::Nested(_), Payload::Raw(raw)) => self.raw_value().map_or(false, |v| v.as_ref() == raw.as_slice()),
        }
    }
}

impl Eq for Tlv {}

impl fmt::Display for Tlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::dump::dump_tlv(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parse_and_serialize_composite() {
        let bytes = [0x10, 0x08, 0x01, 0x01, 0x07, 0x02, 0x03, 0xaa, 0xbb, 0xcc];
        let tlv = Tlv::parse(&bytes).unwrap();
        assert_eq!(tlv.tag(), 0x10);
        assert_eq!(tlv.header_len(), 2);
        let children = tlv.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].absolute_offset(), 2);
        assert_eq!(children[1].absolute_offset(), 5);
        assert_eq!(children[1].raw_value().unwrap().as_ref(), &[0xaa, 0xbb, 0xcc]);
        assert_eq!(tlv.serialize().unwrap(), bytes.to_vec());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let err = Tlv::parse(&[0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn raw_payload_that_is_not_composite() {
        let tlv = Tlv::raw(0x01, false, false, vec![0x01, 0x09]);
        assert_eq!(tlv.children().unwrap_err().kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn append_child_converts_empty_raw() {
        let mut tlv = Tlv::new(0x03, false, false);
        tlv.append_child(Tlv::raw(0x01, false, false, vec![0x07])).unwrap();
        assert!(tlv.is_nested());
        assert_eq!(tlv.serialize().unwrap(), vec![0x03, 0x03, 0x01, 0x01, 0x07]);
    }

    #[test]
    fn equality_ignores_representation() {
        let nested = Tlv::nested(0x03, false, false, vec![Tlv::raw(0x01, false, false, vec![0x07])]);
        let raw = Tlv::raw(0x03, false, false, vec![0x01, 0x01, 0x07]);
        assert_eq!(nested, raw);
        let flagged = Tlv::raw(0x03, true, false, vec![0x01, 0x01, 0x07]);
        assert_ne!(raw, flagged);
    }

    #[test]
    fn oversized_nested_node_equals_itself() {
        // The child cannot be serialised (payload over 0xffff), but equality is structural.
        let big = Tlv::nested(0x03, false, false, vec![Tlv::raw(0x01, false, false, vec![0x5a; 70_000])]);
        assert!(big.serialize().is_err());
        assert_eq!(big, big);
        assert_eq!(big, big.clone());
        let other = Tlv::nested(0x03, false, false, vec![Tlv::raw(0x01, false, false, vec![0x5a; 70_001])]);
        assert_ne!(big, other);
        assert_ne!(big, Tlv::raw(0x03, false, false, Vec::new()));
    }

    #[test]
    fn large_payload_uses_tlv16() {
        let tlv = Tlv::raw(0x05, false, true, vec![0u8; 300]);
        let bytes = tlv.serialize().unwrap();
        assert_eq!(&bytes[..4], &[0xa0, 0x05, 0x01, 0x2c]);
        let back = Tlv::parse(&bytes).unwrap();
        assert_eq!(back.header_len(), 4);
        assert!(back.is_forward());
        assert_eq!(back, tlv);
    }
}
