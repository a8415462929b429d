//! Zero-copy walk over TLV-encoded bytes.
//!
//! This module provides **structure-only** traversal: it reads TLV headers and hands out
//! payload slices without building [`Tlv`](crate::tlv::Tlv) trees. Node parsing in
//! [`tlv`](crate::tlv) and the streaming [`reader`](crate::reader) are both built on the
//! header codec defined here.
//!
//! ## Wire format
//!
//! | Form  | Bytes | Layout |
//! |-------|-------|--------|
//! | TLV8  | 2     | `[flags \| tag(5)] [len]` |
//! | TLV16 | 4     | `[0x80 \| flags \| tag_hi(5)] [tag_lo] [len_hi] [len_lo]` |
//!
//! Flag bits: `0x40` non-critical, `0x20` forward. Serialisation uses TLV8 whenever both
//! tag and length fit, TLV16 otherwise; parsing accepts either form for any value.
//!
//! ## Example
//!
//! ```
//! use ksitlv::walk::{tlv_extent, TlvWalker};
//!
//! let bytes = [0x01, 0x01, 0x07, 0x02, 0x03, 0xaa, 0xbb, 0xcc];
//! assert_eq!(tlv_extent(&bytes, 0).unwrap(), 3);
//! let tags: Vec<u16> = TlvWalker::new(&bytes).map(|r| r.unwrap().header.tag).collect();
//! assert_eq!(tags, vec![1, 2]);
//! ```

use crate::error::{KsiError, Result};
use byteorder::{BigEndian, ByteOrder};

pub const TLV16_FLAG: u8 = 0x80;
pub const NON_CRITICAL_FLAG: u8 = 0x40;
pub const FORWARD_FLAG: u8 = 0x20;

pub const MAX_TLV8_TAG: u16 = 0x1f;
pub const MAX_TAG: u16 = 0x1fff;
pub const MAX_TLV8_LEN: usize = 0xff;
pub const MAX_PAYLOAD_LEN: usize = 0xffff;

/// Decoded TLV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    pub tag: u16,
    pub non_critical: bool,
    pub forward: bool,
    /// 2 for TLV8, 4 for TLV16.
    pub header_len: usize,
    pub payload_len: usize,
}

impl TlvHeader {
    /// Header length implied by the first header byte.
    pub fn len_from_first_byte(b: u8) -> usize {
        if b & TLV16_FLAG != 0 {
            4
        } else {
            2
        }
    }

    /// Parse a header from the start of `bytes`. `Ok(None)` when `bytes` is empty.
    pub fn parse(bytes: &[u8]) -> Result<Option<TlvHeader>> {
        let first = match bytes.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        let header_len = Self::len_from_first_byte(first);
        if bytes.len() < header_len {
            return Err(KsiError::invalid_format(format!(
                "truncated TLV header: need {} bytes, have {}",
                header_len,
                bytes.len()
            )));
        }
        let (tag, payload_len) = if header_len == 4 {
            let tag = ((first & 0x1f) as u16) << 8 | bytes[1] as u16;
            (tag, BigEndian::read_u16(&bytes[2..4]) as usize)
        } else {
            ((first & 0x1f) as u16, bytes[1] as usize)
        };
        Ok(Some(TlvHeader {
            tag,
            non_critical: first & NON_CRITICAL_FLAG != 0,
            forward: first & FORWARD_FLAG != 0,
            header_len,
            payload_len,
        }))
    }

    /// Smallest header able to carry `tag` and `payload_len`.
    pub fn for_payload(tag: u16, non_critical: bool, forward: bool, payload_len: usize) -> Result<TlvHeader> {
        if tag > MAX_TAG {
            return Err(KsiError::invalid_argument(format!("tag 0x{:x} exceeds 0x{:x}", tag, MAX_TAG)));
        }
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(KsiError::invalid_argument(format!(
                "payload of {} bytes exceeds TLV maximum {}",
                payload_len, MAX_PAYLOAD_LEN
            )));
        }
        let header_len = if tag <= MAX_TLV8_TAG && payload_len <= MAX_TLV8_LEN { 2 } else { 4 };
        Ok(TlvHeader { tag, non_critical, forward, header_len, payload_len })
    }

    pub fn total_len(&self) -> usize {
        self.header_len + self.payload_len
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.non_critical {
            flags |= NON_CRITICAL_FLAG;
        }
        if self.forward {
            flags |= FORWARD_FLAG;
        }
        if self.header_len == 4 {
            out.push(TLV16_FLAG | flags | ((self.tag >> 8) as u8 & 0x1f));
            out.push(self.tag as u8);
            let mut len = [0u8; 2];
            BigEndian::write_u16(&mut len, self.payload_len as u16);
            out.extend_from_slice(&len);
        } else {
            out.push(flags | (self.tag as u8 & 0x1f));
            out.push(self.payload_len as u8);
        }
    }
}

/// One TLV seen by [`TlvWalker`].
#[derive(Debug, Clone, Copy)]
pub struct WalkItem<'a> {
    pub header: TlvHeader,
    pub payload: &'a [u8],
    /// Absolute offset of the header (walker base + position).
    pub offset: usize,
}

/// Borrowing iterator over consecutive TLVs in a slice. Stops after the first error.
pub struct TlvWalker<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    done: bool,
}

impl<'a> TlvWalker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Walk `data` reporting offsets as if it started at `base` in the source stream.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        TlvWalker { data, pos: 0, base, done: false }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl<'a> Iterator for TlvWalker<'a> {
    type Item = Result<WalkItem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = &self.data[self.pos..];
        let header = match TlvHeader::parse(rest) {
            Ok(Some(h)) => h,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e.at(format_args!("offset {}", self.base + self.pos))));
            }
        };
        if rest.len() < header.total_len() {
            self.done = true;
            return Some(Err(KsiError::invalid_format(format!(
                "truncated TLV payload at offset {}: tag 0x{:x} declares {} bytes, {} available",
                self.base + self.pos,
                header.tag,
                header.payload_len,
                rest.len() - header.header_len
            ))));
        }
        let item = WalkItem {
            header,
            payload: &rest[header.header_len..header.total_len()],
            offset: self.base + self.pos,
        };
        self.pos += header.total_len();
        Some(Ok(item))
    }
}

/// Number of bytes occupied by the TLV starting at `pos`.
pub fn tlv_extent(data: &[u8], pos: usize) -> Result<usize> {
    if pos > data.len() {
        return Err(KsiError::invalid_argument(format!("position {} past end {}", pos, data.len())));
    }
    match TlvWalker::with_base(&data[pos..], pos).next() {
        Some(Ok(item)) => Ok(item.header.total_len()),
        Some(Err(e)) => Err(e),
        None => Err(KsiError::invalid_format(format!("no TLV at offset {}", pos))),
    }
}
