//! Pull TLVs one at a time from any [`Read`] source.
//!
//! [`TlvReader`] is the generator side of
//! [`extract_generator`](crate::codec::extract_generator): each call to `next` reads exactly
//! one top-level TLV. End of input between TLVs ends the stream; end of input inside a
//! header or payload is `InvalidFormat`. After the end or the first error the reader is
//! fused.

use crate::context::Config;
use crate::error::{KsiError, Result};
use crate::tlv::Tlv;
use crate::walk::TlvHeader;
use std::io::{ErrorKind as IoErrorKind, Read};

pub struct TlvReader<R> {
    inner: R,
    offset: u64,
    limit: Option<u64>,
    done: bool,
}

impl<R: Read> TlvReader<R> {
    pub fn new(inner: R) -> Self {
        TlvReader { inner, offset: 0, limit: None, done: false }
    }

    /// Reader that honours `config.max_stream_bytes`.
    pub fn with_config(inner: R, config: &Config) -> Self {
        TlvReader { inner, offset: 0, limit: config.max_stream_bytes, done: false }
    }

    /// Stop with `LimitExceeded` once more than `bytes` would be consumed.
    pub fn with_limit(mut self, bytes: u64) -> Self {
        self.limit = Some(bytes);
        self
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn reserve(&self, n: usize) -> Result<()> {
        match self.limit {
            Some(max) if self.offset + n as u64 > max => Err(KsiError::limit(format!(
                "stream exceeds {} bytes at offset {}",
                max, self.offset
            ))),
            _ => Ok(()),
        }
    }

    /// First header byte, or `None` on a clean end of input.
    fn read_first(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            match self.inner.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_tlv(&mut self) -> Result<Option<Tlv>> {
        let first = match self.read_first()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let start = self.offset;
        let header_len = TlvHeader::len_from_first_byte(first);
        self.reserve(header_len)?;

        let mut head = [0u8; 4];
        head[0] = first;
        self.inner
            .read_exact(&mut head[1..header_len])
            .map_err(|e| KsiError::from(e).at(format_args!("TLV header at offset {}", start)))?;
        let header = match TlvHeader::parse(&head[..header_len])? {
            Some(h) => h,
            None => return Ok(None),
        };
        self.reserve(header.total_len())?;

        let mut payload = vec![0u8; header.payload_len];
        self.inner
            .read_exact(&mut payload)
            .map_err(|e| KsiError::from(e).at(format_args!("TLV[0x{:02x}] at offset {}", header.tag, start)))?;
        self.offset += header.total_len() as u64;
        tracing::trace!(tag = header.tag, offset = start, len = header.payload_len, "read TLV");
        Ok(Some(Tlv::from_parts(header, payload, start as usize)))
    }
}

impl<R: Read> Iterator for TlvReader<R> {
    type Item = Result<Tlv>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_tlv() {
            Ok(Some(tlv)) => Some(Ok(tlv)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for TlvReader<R> {}
