//! # ksitlv: TLV template engine for Keyless Signature Infrastructure messages
//!
//! KSI data structures (signatures, aggregation responses, publications files) are encoded
//! as trees of TLV nodes. This crate maps those trees onto plain Rust structs through
//! declarative, per-type templates, and back again.
//!
//! ## Layers
//!
//! - [`walk`]: TLV8/TLV16 header codec and zero-copy traversal of raw bytes
//! - [`tlv`]: owned [`Tlv`] nodes, lazily parsed into children
//! - [`reader`]: one-node-at-a-time [`TlvReader`] over any `Read`
//! - [`value`]: leaf types (integers, octet strings, UTF-8 strings, imprints)
//! - [`template`]: field descriptors, [`Template`] tables and the [`tlv_template!`] macro
//! - [`codec`]: [`extract`], [`extract_generator`], [`construct`], [`deep_copy`]
//! - [`lint`]: self-check of template tables
//! - [`dump`]: indented text rendering of TLV trees
//!
//! ## Example
//!
//! ```
//! use ksitlv::{decode_bytes, encode_bytes, tlv_template, Context, Flags};
//! use ksitlv::value::Utf8String;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Note {
//!     id: Option<u64>,
//!     text: Option<Utf8String>,
//! }
//!
//! tlv_template! {
//!     Note = "Note" {
//!         native_int(0x01, Flags::NONE, |n| n.id, |n, v| n.id = Some(v));
//!         object(0x02, Flags::NONE, |n| n.text.as_ref(), |n, v| n.text = Some(v));
//!     }
//! }
//!
//! let mut ctx = Context::new();
//! let note = Note { id: Some(5), text: Some(Utf8String::new("hi").unwrap()) };
//! let bytes = encode_bytes(&mut ctx, &note, 0x10, Flags::NONE).unwrap();
//! assert_eq!(bytes, [0x10, 0x08, 0x01, 0x01, 0x05, 0x02, 0x03, b'h', b'i', 0x00]);
//! let back: Note = decode_bytes(&mut ctx, &bytes).unwrap();
//! assert_eq!(back, note);
//! ```

pub mod codec;
pub mod context;
pub mod dump;
pub mod error;
pub mod lint;
pub mod list;
pub mod reader;
pub mod template;
pub mod tlv;
pub mod value;
pub mod walk;

pub use codec::{
    clone_object, construct, decode, decode_bytes, decode_with_remainder, deep_copy, encode, encode_bytes,
    extract, extract_generator,
};
pub use context::{Config, Context, Diagnostic};
pub use dump::{dump_tlv, dump_tlv_expanded};
pub use error::{ErrorKind, KsiError, Result};
pub use list::TlvList;
pub use reader::TlvReader;
pub use template::{Field, FieldKind, Flags, Template, TemplateBuilder, TlvObject};
pub use tlv::{Payload, Tlv};
pub use value::TlvValue;
pub use walk::{tlv_extent, TlvHeader, TlvWalker};
