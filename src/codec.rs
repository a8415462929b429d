//! Template-driven conversion between TLV trees and typed objects.
//!
//! - [`extract`] decodes the children of a node into a caller-initialised payload.
//! - [`extract_generator`] does the same for children pulled one at a time from an
//!   iterator (e.g. a [`TlvReader`](crate::reader::TlvReader) over a file).
//! - [`construct`] encodes a payload into the children of a destination node, in template
//!   declaration order.
//! - [`deep_copy`] round-trips an object through [`construct`] and [`extract`].
//!
//! ## Matching
//!
//! Each child is matched against the first field with an equal tag. A non-multiple field
//! seen twice is [`ErrorKind::DuplicateTlv`](crate::error::ErrorKind::DuplicateTlv). An
//! unmatched child goes to the remainder sink when one is supplied (only if its forward
//! flag is set, otherwise it is dropped); without a sink it must be non-critical or the
//! call fails with `UnknownCriticalTlv`. Nested composites never get a sink.
//!
//! ## Failure
//!
//! The first error aborts the call. Sub-objects under construction are dropped; fields
//! already attached to the caller's payload stay there and are released with it. Every
//! failure is also recorded in the [`Context`] diagnostic trail with its template/tag path;
//! the trail is cleared at the start of each top-level call.
//! Nesting depth and node count are bounded by [`Config`](crate::context::Config).

use crate::context::Context;
use crate::error::{KsiError, Result};
use crate::template::{Field, FieldKind, Flags, Template, TlvObject};
use crate::tlv::Tlv;
use crate::value::{decode_uint, encode_uint};
use std::borrow::Borrow;

/// Decoding state for one top-level call.
pub struct Decoder<'c> {
    ctx: &'c mut Context,
    depth: usize,
    nodes: usize,
}

impl<'c> Decoder<'c> {
    fn new(ctx: &'c mut Context) -> Self {
        Decoder { ctx, depth: 0, nodes: 0 }
    }

    pub fn context(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        self.depth += 1;
        let max = self.ctx.config().max_depth;
        if self.depth > max {
            return Err(KsiError::limit(format!("{} nested deeper than {} levels", name, max)));
        }
        Ok(())
    }

    fn count_node(&mut self) -> Result<()> {
        self.nodes += 1;
        let max = self.ctx.config().max_nodes;
        if self.nodes > max {
            return Err(KsiError::limit(format!("more than {} nodes in one document", max)));
        }
        Ok(())
    }

    /// Decode the children of `node` into `payload`; used for composite fields.
    pub fn extract_nested<S>(&mut self, payload: &mut S, node: &Tlv, template: &Template<S>) -> Result<()>
    where
        S: 'static,
    {
        let children = node.children()?;
        self.extract_level(payload, children.iter().map(Ok), template, None)
    }

    fn extract_level<T, N, I>(
        &mut self,
        payload: &mut T,
        nodes: I,
        template: &Template<T>,
        mut remainder: Option<&mut Vec<Tlv>>,
    ) -> Result<()>
    where
        T: 'static,
        N: Borrow<Tlv>,
        I: IntoIterator<Item = Result<N>>,
    {
        self.enter(template.name())?;
        let mut seen = vec![false; template.fields().len()];
        for item in nodes {
            let owned = item?;
            let node: &Tlv = owned.borrow();
            self.match_node(payload, node, template, &mut seen, remainder.as_deref_mut())
                .map_err(|e| e.at(format_args!("{}.TLV[0x{:02x}]", template.name(), node.tag())))?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn match_node<T: 'static>(
        &mut self,
        payload: &mut T,
        node: &Tlv,
        template: &Template<T>,
        seen: &mut [bool],
        remainder: Option<&mut Vec<Tlv>>,
    ) -> Result<()> {
        self.count_node()?;
        let (index, field) = match template.find(node.tag()) {
            Some(m) => m,
            None => return unmatched(node, template, remainder),
        };
        if seen[index] && !field.multiple {
            return Err(KsiError::duplicate(format!("{} field occurs more than once", field.kind.name())));
        }
        seen[index] = true;
        tracing::trace!(template = template.name(), tag = node.tag(), kind = field.kind.name(), "matched");
        self.decode_field(payload, node, field)
    }

    fn decode_field<T: 'static>(&mut self, payload: &mut T, node: &Tlv, field: &Field<T>) -> Result<()> {
        match &field.kind {
            FieldKind::NativeInt { set, .. } => {
                let v = decode_uint(&node.raw_value()?)?;
                set(payload, v);
                Ok(())
            }
            FieldKind::SeekPos { set } => {
                set(payload, node.absolute_offset() as u64);
                Ok(())
            }
            FieldKind::Object(slot) => slot.decode(payload, node),
            FieldKind::Composite(slot) => slot.decode(self, payload, node),
            FieldKind::List(slot) => slot.decode_element(self, payload, node),
            FieldKind::Callback(slot) => slot.decode(self, payload, node),
        }
    }
}

fn unmatched<T: 'static>(node: &Tlv, template: &Template<T>, remainder: Option<&mut Vec<Tlv>>) -> Result<()> {
    match remainder {
        Some(sink) => {
            if node.is_forward() {
                tracing::trace!(template = template.name(), tag = node.tag(), "unknown TLV forwarded");
                sink.push(node.clone());
            } else {
                tracing::trace!(template = template.name(), tag = node.tag(), "unknown TLV dropped");
            }
            Ok(())
        }
        None if node.is_non_critical() => {
            tracing::trace!(template = template.name(), tag = node.tag(), "unknown non-critical TLV ignored");
            Ok(())
        }
        None => Err(KsiError::unknown_critical(format!("tag 0x{:02x} not in template", node.tag()))),
    }
}

/// Encoding state for one top-level call.
pub struct Encoder<'c> {
    ctx: &'c mut Context,
    depth: usize,
}

impl<'c> Encoder<'c> {
    fn new(ctx: &'c mut Context) -> Self {
        Encoder { ctx, depth: 0 }
    }

    pub fn context(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    /// Encode `payload` as a fresh composite node.
    pub fn construct_nested<S: 'static>(&mut self, payload: &S, template: &Template<S>, tag: u16, flags: Flags) -> Result<Tlv> {
        let children = self.construct_children(payload, template)?;
        Ok(Tlv::nested(tag, flags.non_critical, flags.forward, children))
    }

    fn construct_children<T: 'static>(&mut self, payload: &T, template: &Template<T>) -> Result<Vec<Tlv>> {
        self.depth += 1;
        let max = self.ctx.config().max_depth;
        if self.depth > max {
            return Err(KsiError::limit(format!("{} nested deeper than {} levels", template.name(), max)));
        }
        let mut children = Vec::new();
        for field in template.fields() {
            self.encode_field(payload, field, &mut children)
                .map_err(|e| e.at(format_args!("{}.TLV[0x{:02x}]", template.name(), field.tag)))?;
        }
        self.depth -= 1;
        Ok(children)
    }

    fn encode_field<T: 'static>(&mut self, payload: &T, field: &Field<T>, out: &mut Vec<Tlv>) -> Result<()> {
        let node = match &field.kind {
            FieldKind::NativeInt { get, .. } => {
                get(payload).map(|v| Tlv::raw(field.tag, field.flags.non_critical, field.flags.forward, encode_uint(v)))
            }
            FieldKind::SeekPos { .. } => None,
            FieldKind::Object(slot) => slot.encode(payload, field.tag, field.flags)?,
            FieldKind::Composite(slot) => slot.encode(self, payload, field.tag, field.flags)?,
            FieldKind::List(slot) => {
                slot.encode(self, payload, field.tag, field.flags, out)?;
                None
            }
            FieldKind::Callback(slot) => slot.encode(self, payload, field.tag, field.flags)?,
        };
        if let Some(node) = node {
            out.push(node);
        }
        Ok(())
    }
}

fn fail<T>(ctx: &mut Context, err: KsiError) -> Result<T> {
    ctx.record(&err);
    Err(err)
}

/// Populate `payload` from the children of `tlv`, in document order.
///
/// Unmatched top-level children go to `remainder` when it is supplied (forward-flagged
/// ones only). The root's own tag and flags are not inspected.
pub fn extract<T: 'static>(
    ctx: &mut Context,
    payload: &mut T,
    tlv: &Tlv,
    template: &Template<T>,
    remainder: Option<&mut Vec<Tlv>>,
) -> Result<()> {
    ctx.clear_errors();
    let children = match tlv.children() {
        Ok(c) => c,
        Err(e) => return fail(ctx, e.at(template.name())),
    };
    let result = Decoder::new(ctx).extract_level(payload, children.iter().map(Ok), template, remainder);
    match result {
        Ok(()) => Ok(()),
        Err(e) => fail(ctx, e),
    }
}

/// Like [`extract`], with the top-level children pulled from `generator` one at a time.
///
/// The generator is polled in order until it yields `None`, and never after; an `Err`
/// item aborts the call.
pub fn extract_generator<T, I>(
    ctx: &mut Context,
    payload: &mut T,
    generator: I,
    template: &Template<T>,
    remainder: Option<&mut Vec<Tlv>>,
) -> Result<()>
where
    T: 'static,
    I: IntoIterator<Item = Result<Tlv>>,
{
    ctx.clear_errors();
    let result = Decoder::new(ctx).extract_level(payload, generator, template, remainder);
    match result {
        Ok(()) => Ok(()),
        Err(e) => fail(ctx, e),
    }
}

/// Append one child to `tlv` per present field of `payload`, in template order.
///
/// `tlv` is only modified when every field encodes successfully.
pub fn construct<T: 'static>(ctx: &mut Context, tlv: &mut Tlv, payload: &T, template: &Template<T>) -> Result<()> {
    ctx.clear_errors();
    let result = Encoder::new(ctx).construct_children(payload, template);
    let children = match result {
        Ok(c) => c,
        Err(e) => return fail(ctx, e),
    };
    for child in children {
        if let Err(e) = tlv.append_child(child) {
            return fail(ctx, e.at(template.name()));
        }
    }
    Ok(())
}

/// Copy `from` into the empty `to` by encoding and decoding with `template`.
///
/// Anything `template` does not describe is not copied.
pub fn deep_copy<T: 'static>(ctx: &mut Context, from: &T, template: &Template<T>, to: &mut T) -> Result<()> {
    let mut tmp = Tlv::new(0, false, false);
    construct(ctx, &mut tmp, from, template)?;
    extract(ctx, to, &tmp, template, None)
}

/// Decode a whole object; unknown critical children are an error.
pub fn decode<T: TlvObject>(ctx: &mut Context, tlv: &Tlv) -> Result<T> {
    let mut obj = T::default();
    extract(ctx, &mut obj, tlv, T::template(), None)?;
    Ok(obj)
}

/// Decode a whole object, also returning the forward-flagged unknown top-level children.
pub fn decode_with_remainder<T: TlvObject>(ctx: &mut Context, tlv: &Tlv) -> Result<(T, Vec<Tlv>)> {
    let mut obj = T::default();
    let mut remainder = Vec::new();
    extract(ctx, &mut obj, tlv, T::template(), Some(&mut remainder))?;
    Ok((obj, remainder))
}

/// Parse exactly one TLV from `bytes` and decode it.
pub fn decode_bytes<T: TlvObject>(ctx: &mut Context, bytes: &[u8]) -> Result<T> {
    ctx.clear_errors();
    let tlv = match Tlv::parse(bytes) {
        Ok(t) => t,
        Err(e) => return fail(ctx, e),
    };
    decode(ctx, &tlv)
}

/// Encode `obj` as a composite node with the given header.
pub fn encode<T: TlvObject>(ctx: &mut Context, obj: &T, tag: u16, flags: Flags) -> Result<Tlv> {
    let mut tlv = Tlv::new(tag, flags.non_critical, flags.forward);
    construct(ctx, &mut tlv, obj, T::template())?;
    Ok(tlv)
}

pub fn encode_bytes<T: TlvObject>(ctx: &mut Context, obj: &T, tag: u16, flags: Flags) -> Result<Vec<u8>> {
    let tlv = encode(ctx, obj, tag, flags)?;
    match tlv.serialize() {
        Ok(b) => Ok(b),
        Err(e) => fail(ctx, e),
    }
}

/// Independent copy of `obj` via its registered template.
pub fn clone_object<T: TlvObject>(ctx: &mut Context, obj: &T) -> Result<T> {
    let mut out = T::default();
    deep_copy(ctx, obj, T::template(), &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::error::ErrorKind;
    use crate::value::OctetString;

    #[derive(Debug, Default, PartialEq)]
    struct Record {
        value: Option<u64>,
        data: Option<OctetString>,
        pos: Option<u64>,
    }

    fn record_template() -> Template<Record> {
        Template::<Record>::builder("Record")
            .native_int(0x01, Flags::NONE, |r| r.value, |r, v| r.value = Some(v))
            .object(0x02, Flags::NONE, |r| r.data.as_ref(), |r, v| r.data = Some(v))
            .seek_pos(0x02, |r, v| r.pos = Some(v))
            .build()
    }

    fn root(children: Vec<Tlv>) -> Tlv {
        Tlv::nested(0x10, false, false, children)
    }

    #[test]
    fn extract_and_construct_record() {
        let mut ctx = Context::new();
        let t = record_template();
        let tlv = Tlv::parse(&[0x10, 0x08, 0x01, 0x01, 0x07, 0x02, 0x03, 0xaa, 0xbb, 0xcc]).unwrap();
        let mut rec = Record::default();
        extract(&mut ctx, &mut rec, &tlv, &t, None).unwrap();
        assert_eq!(rec.value, Some(7));
        assert_eq!(rec.data.as_ref().map(|d| d.as_bytes().to_vec()), Some(vec![0xaa, 0xbb, 0xcc]));
        // The seek-pos descriptor shares tag 0x02 but is never reached: first match wins.
        assert_eq!(rec.pos, None);

        let mut out = Tlv::new(0x10, false, false);
        construct(&mut ctx, &mut out, &rec, &t).unwrap();
        assert_eq!(out.serialize().unwrap(), tlv.serialize().unwrap());
    }

    #[test]
    fn unknown_critical_without_sink() {
        let mut ctx = Context::new();
        let t = record_template();
        let tlv = root(vec![Tlv::raw(0x1e, false, false, vec![1])]);
        let err = extract(&mut ctx, &mut Record::default(), &tlv, &t, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCriticalTlv);
        assert_eq!(ctx.last_error().map(|d| d.kind), Some(ErrorKind::UnknownCriticalTlv));
        assert!(err.message().starts_with("Record.TLV[0x1e]"));
    }

    #[test]
    fn duplicate_native_int() {
        let mut ctx = Context::new();
        let t = record_template();
        let tlv = root(vec![Tlv::raw(0x01, false, false, vec![1]), Tlv::raw(0x01, false, false, vec![2])]);
        let mut rec = Record::default();
        let err = extract(&mut ctx, &mut rec, &tlv, &t, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateTlv);
        // First occurrence stays attached; the caller owns the partial payload.
        assert_eq!(rec.value, Some(1));
    }

    #[test]
    fn node_limit_applies() {
        let mut ctx = Context::with_config(Config::default().with_max_nodes(1));
        let t = record_template();
        let tlv = root(vec![Tlv::raw(0x01, false, false, vec![1]), Tlv::raw(0x02, false, false, vec![])]);
        let err = extract(&mut ctx, &mut Record::default(), &tlv, &t, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn absent_fields_are_not_encoded() {
        let mut ctx = Context::new();
        let t = record_template();
        let mut out = Tlv::new(0x10, false, false);
        construct(&mut ctx, &mut out, &Record::default(), &t).unwrap();
        assert!(out.children().unwrap().is_empty());
        assert_eq!(out.serialize().unwrap(), vec![0x10, 0x00]);
    }

    #[test]
    fn root_that_is_not_composite() {
        let mut ctx = Context::new();
        let t = record_template();
        let tlv = Tlv::raw(0x10, false, false, vec![0x01]);
        let err = extract(&mut ctx, &mut Record::default(), &tlv, &t, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn diagnostic_trail_covers_one_call() {
        let mut ctx = Context::new();
        let t = record_template();
        let bad = root(vec![Tlv::raw(0x1e, false, false, vec![1])]);
        for _ in 0..100_000 {
            assert!(extract(&mut ctx, &mut Record::default(), &bad, &t, None).is_err());
        }
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.last_error().map(|d| d.kind), Some(ErrorKind::UnknownCriticalTlv));

        let truncated = vec![Ok(Tlv::raw(0x01, false, false, vec![1])), Err(KsiError::invalid_format("truncated"))];
        assert!(extract_generator(&mut ctx, &mut Record::default(), truncated, &t, None).is_err());
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.last_error().map(|d| d.kind), Some(ErrorKind::InvalidFormat));

        let mut out = Tlv::new(0x10, false, false);
        construct(&mut ctx, &mut out, &Record { value: Some(1), ..Record::default() }, &t).unwrap();
        assert!(ctx.errors().is_empty());
    }
}
