//! Format TLV trees for display (dump text). Raw payloads that parse cleanly as a child
//! sequence are shown as nested when `expand` is requested.

use crate::tlv::{Payload, Tlv};
use std::borrow::Cow;
use std::fmt::Write;

/// Hex string of `bytes`, lowercase, no separators.
pub fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn flags(tlv: &Tlv) -> String {
    let mut f = String::new();
    if tlv.is_non_critical() {
        f.push('N');
    }
    if tlv.is_forward() {
        f.push('F');
    }
    if f.is_empty() {
        f.push('-');
    }
    f
}

/// One line per node: `TLV[0xNN] (flags) len=L: hex`, children indented two spaces per level.
pub fn dump_tlv(tlv: &Tlv) -> String {
    let mut out = String::new();
    dump_into(&mut out, tlv, 0, false, usize::MAX);
    out
}

/// Like [`dump_tlv`], additionally trying to show raw payloads as child sequences,
/// down to `max_depth` levels.
pub fn dump_tlv_expanded(tlv: &Tlv, max_depth: usize) -> String {
    let mut out = String::new();
    dump_into(&mut out, tlv, 0, true, max_depth);
    out
}

fn dump_into(out: &mut String, tlv: &Tlv, depth: usize, expand: bool, max_depth: usize) {
    let indent = "  ".repeat(depth);
    let raw = tlv.raw_value().unwrap_or_default();
    let _ = write!(out, "{}TLV[0x{:02x}] ({}) len={}", indent, tlv.tag(), flags(tlv), raw.len());
    let children: Option<Cow<'_, [Tlv]>> = match tlv.payload() {
        Payload::Nested(c) => Some(Cow::Borrowed(c.as_slice())),
        Payload::Raw(_) if expand && depth < max_depth && !raw.is_empty() => tlv.children().ok(),
        Payload::Raw(_) => None,
    };
    match children {
        Some(children) if depth < max_depth => {
            out.push_str(":\n");
            for c in children.iter() {
                dump_into(out, c, depth + 1, expand, max_depth);
            }
        }
        _ => {
            let _ = writeln!(out, ": {}", hex(&raw));
        }
    }
}
