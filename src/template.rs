//! Declarative TLV templates: one immutable table of field descriptors per structured type.
//!
//! A [`Template<T>`] maps the children of a composite node onto the fields of `T`. Each
//! [`Field`] carries a tag, the non-critical/forward flags used when encoding, a `multiple`
//! flag and a [`FieldKind`] holding typed accessors. Accessors are plain `fn` pointers, so a
//! template is `Send + Sync` and can live in a `static`.
//!
//! ## Field kinds
//!
//! | Kind | Node content | Accessors |
//! |------|--------------|-----------|
//! | [`FieldKind::NativeInt`] | minimal big-endian `u64` | `fn(&T) -> Option<u64>`, `fn(&mut T, u64)` |
//! | [`FieldKind::Object`] | any [`TlvValue`] | `fn(&T) -> Option<&V>`, `fn(&mut T, V)` |
//! | [`FieldKind::Composite`] | nested [`TlvObject`] | `fn(&T) -> Option<&S>`, `fn(&mut T, S)` |
//! | [`FieldKind::List`] | repeated values or composites | `fn(&T) -> Option<&L>`, `fn(&mut T) -> &mut Option<L>` |
//! | [`FieldKind::SeekPos`] | absolute offset of the node (decode only) | `fn(&mut T, u64)` |
//! | [`FieldKind::Callback`] | custom encode/decode functions | `fn(&T) -> Option<&V>` + callbacks taking the [`Encoder`]/[`Decoder`] |
//!
//! ## Declaring a template
//!
//! ```
//! use ksitlv::template::Flags;
//! use ksitlv::value::OctetString;
//! use ksitlv::tlv_template;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Record {
//!     value: Option<u64>,
//!     data: Option<OctetString>,
//! }
//!
//! tlv_template! {
//!     Record = "Record" {
//!         native_int(0x01, Flags::NONE, |r| r.value, |r, v| r.value = Some(v));
//!         object(0x02, Flags::NONE, |r| r.data.as_ref(), |r, v| r.data = Some(v));
//!     }
//! }
//! ```

use crate::codec::{Decoder, Encoder};
use crate::error::Result;
use crate::lint::{lint_template, Severity};
use crate::list::TlvList;
use crate::tlv::Tlv;
use crate::value::TlvValue;

/// Header flags written on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub non_critical: bool,
    pub forward: bool,
}

impl Flags {
    pub const NONE: Flags = Flags { non_critical: false, forward: false };
    pub const NON_CRITICAL: Flags = Flags { non_critical: true, forward: false };
    pub const FORWARD: Flags = Flags { non_critical: false, forward: true };
    pub const NON_CRITICAL_FORWARD: Flags = Flags { non_critical: true, forward: true };
}

/// A structured type with a registered template.
pub trait TlvObject: Default + 'static {
    fn template() -> &'static Template<Self>;
}

/// Scalar value field.
pub trait ObjectSlot<T>: Send + Sync {
    fn decode(&self, owner: &mut T, node: &Tlv) -> Result<()>;
    fn encode(&self, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>>;
}

/// Nested composite field.
pub trait CompositeSlot<T>: Send + Sync {
    fn decode(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()>;
    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>>;
    fn template_name(&self) -> &'static str;
}

/// Repeatable field backed by a [`TlvList`].
pub trait ListSlot<T>: Send + Sync {
    /// Decode one occurrence and append it, creating the container on first use.
    fn decode_element(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()>;
    /// Emit one node per element, in container order.
    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags, out: &mut Vec<Tlv>) -> Result<()>;
    fn is_composite(&self) -> bool;
}

/// Field converted by caller-supplied functions.
///
/// The functions run inside the enclosing call's [`Decoder`]/[`Encoder`], so nested
/// extraction from a callback counts against the same depth and node limits.
pub trait CallbackSlot<T>: Send + Sync {
    fn decode(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()>;
    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>>;
}

pub enum FieldKind<T> {
    Object(Box<dyn ObjectSlot<T>>),
    Composite(Box<dyn CompositeSlot<T>>),
    List(Box<dyn ListSlot<T>>),
    NativeInt { get: fn(&T) -> Option<u64>, set: fn(&mut T, u64) },
    SeekPos { set: fn(&mut T, u64) },
    Callback(Box<dyn CallbackSlot<T>>),
}

impl<T> FieldKind<T> {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Object(_) => "object",
            FieldKind::Composite(_) => "composite",
            FieldKind::List(l) if l.is_composite() => "composite list",
            FieldKind::List(_) => "object list",
            FieldKind::NativeInt { .. } => "native int",
            FieldKind::SeekPos { .. } => "seek pos",
            FieldKind::Callback(_) => "callback",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::List(_))
    }
}

/// One template entry.
pub struct Field<T> {
    pub tag: u16,
    pub flags: Flags,
    /// Duplicate tags allowed at one level.
    pub multiple: bool,
    pub kind: FieldKind<T>,
}

pub struct Template<T> {
    name: &'static str,
    fields: Vec<Field<T>>,
}

impl<T: 'static> Template<T> {
    /// Start a template for `T`.
    ///
    /// Name the type with a turbofish, `Template::<Record>::builder("Record")`: the accessor
    /// closures passed to the builder need `T` known before they are checked, and a type
    /// annotation on the `let` binding comes too late for that.
    /// [`tlv_template!`](crate::tlv_template) does this for you.
    pub fn builder(name: &'static str) -> TemplateBuilder<T> {
        TemplateBuilder { name, fields: Vec::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// First descriptor whose tag equals `tag`, with its index.
    pub fn find(&self, tag: u16) -> Option<(usize, &Field<T>)> {
        self.fields.iter().enumerate().find(|(_, f)| f.tag == tag)
    }
}

impl<T> std::fmt::Debug for Template<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Template({}) ", self.name)?;
        let mut list = f.debug_list();
        for field in &self.fields {
            list.entry(&format_args!("0x{:02x} {}", field.tag, field.kind.name()));
        }
        list.finish()
    }
}

pub struct TemplateBuilder<T> {
    name: &'static str,
    fields: Vec<Field<T>>,
}

impl<T: 'static> TemplateBuilder<T> {
    fn push(mut self, tag: u16, flags: Flags, multiple: bool, kind: FieldKind<T>) -> Self {
        self.fields.push(Field { tag, flags, multiple, kind });
        self
    }

    pub fn native_int(self, tag: u16, flags: Flags, get: fn(&T) -> Option<u64>, set: fn(&mut T, u64)) -> Self {
        self.push(tag, flags, false, FieldKind::NativeInt { get, set })
    }

    pub fn object<V: TlvValue + 'static>(
        self,
        tag: u16,
        flags: Flags,
        get: fn(&T) -> Option<&V>,
        set: fn(&mut T, V),
    ) -> Self {
        self.push(tag, flags, false, FieldKind::Object(Box::new(ObjectField { get, set })))
    }

    pub fn composite<S: TlvObject>(self, tag: u16, flags: Flags, get: fn(&T) -> Option<&S>, set: fn(&mut T, S)) -> Self {
        self.push(tag, flags, false, FieldKind::Composite(Box::new(CompositeField { get, set })))
    }

    pub fn object_list<L>(self, tag: u16, flags: Flags, get: fn(&T) -> Option<&L>, slot: fn(&mut T) -> &mut Option<L>) -> Self
    where
        L: TlvList + 'static,
        L::Item: TlvValue,
    {
        self.push(tag, flags, true, FieldKind::List(Box::new(ValueListField { get, slot })))
    }

    pub fn composite_list<L>(
        self,
        tag: u16,
        flags: Flags,
        get: fn(&T) -> Option<&L>,
        slot: fn(&mut T) -> &mut Option<L>,
    ) -> Self
    where
        L: TlvList + 'static,
        L::Item: TlvObject,
    {
        self.push(tag, flags, true, FieldKind::List(Box::new(CompositeListField { get, slot })))
    }

    pub fn seek_pos(self, tag: u16, set: fn(&mut T, u64)) -> Self {
        self.push(tag, Flags::NONE, false, FieldKind::SeekPos { set })
    }

    pub fn callback<V: 'static>(
        self,
        tag: u16,
        flags: Flags,
        get: fn(&T) -> Option<&V>,
        encode: fn(&mut Encoder<'_>, &V, &mut Tlv) -> Result<()>,
        decode: fn(&mut Decoder<'_>, &Tlv, &mut T) -> Result<()>,
    ) -> Self {
        self.push(tag, flags, true, FieldKind::Callback(Box::new(CallbackField { get, encode, decode })))
    }

    /// Allow the most recently added field to occur more than once.
    pub fn multiple(mut self) -> Self {
        if let Some(f) = self.fields.last_mut() {
            f.multiple = true;
        }
        self
    }

    /// Forbid repeats of the most recently added field.
    pub fn single(mut self) -> Self {
        if let Some(f) = self.fields.last_mut() {
            f.multiple = false;
        }
        self
    }

    pub fn build(self) -> Template<T> {
        let template = Template { name: self.name, fields: self.fields };
        for m in lint_template(&template) {
            match m.severity {
                Severity::Error => tracing::warn!(template = template.name, tag = m.tag, rule = ?m.rule, "{}", m.message),
                Severity::Warning => tracing::debug!(template = template.name, tag = m.tag, rule = ?m.rule, "{}", m.message),
            }
        }
        template
    }
}

/// Implement [`TlvObject`] for a type with a lazily built, process-wide template.
///
/// Each line names a [`TemplateBuilder`] method and its arguments. A `multiple();` or
/// `single();` line applies to the field declared just above it.
#[macro_export]
macro_rules! tlv_template {
    ($ty:ty = $name:literal { $( $method:ident ( $($arg:expr),* $(,)? ) );* $(;)? }) => {
        impl $crate::template::TlvObject for $ty {
            fn template() -> &'static $crate::template::Template<$ty> {
                static TEMPLATE: ::std::sync::OnceLock<$crate::template::Template<$ty>> =
                    ::std::sync::OnceLock::new();
                TEMPLATE.get_or_init(|| {
                    $crate::template::Template::<$ty>::builder($name)
                        $( .$method( $($arg),* ) )*
                        .build()
                })
            }
        }
    };
}

struct ObjectField<T, V> {
    get: fn(&T) -> Option<&V>,
    set: fn(&mut T, V),
}

impl<T, V: TlvValue> ObjectSlot<T> for ObjectField<T, V> {
    fn decode(&self, owner: &mut T, node: &Tlv) -> Result<()> {
        let v = V::from_tlv(node)?;
        (self.set)(owner, v);
        Ok(())
    }

    fn encode(&self, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>> {
        match (self.get)(owner) {
            Some(v) => v.to_tlv(tag, flags.non_critical, flags.forward).map(Some),
            None => Ok(None),
        }
    }
}

struct CompositeField<T, S> {
    get: fn(&T) -> Option<&S>,
    set: fn(&mut T, S),
}

impl<T, S: TlvObject> CompositeSlot<T> for CompositeField<T, S> {
    fn decode(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()> {
        let mut sub = S::default();
        dec.extract_nested(&mut sub, node, S::template())?;
        (self.set)(owner, sub);
        Ok(())
    }

    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>> {
        match (self.get)(owner) {
            Some(sub) => enc.construct_nested(sub, S::template(), tag, flags).map(Some),
            None => Ok(None),
        }
    }

    fn template_name(&self) -> &'static str {
        S::template().name()
    }
}

struct ValueListField<T, L> {
    get: fn(&T) -> Option<&L>,
    slot: fn(&mut T) -> &mut Option<L>,
}

impl<T, L> ListSlot<T> for ValueListField<T, L>
where
    L: TlvList,
    L::Item: TlvValue,
{
    fn decode_element(&self, _dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()> {
        let item = <L::Item as TlvValue>::from_tlv(node)?;
        (self.slot)(owner).get_or_insert_with(L::new_list).append(item);
        Ok(())
    }

    fn encode(&self, _enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags, out: &mut Vec<Tlv>) -> Result<()> {
        if let Some(list) = (self.get)(owner) {
            for item in list.iter() {
                out.push(item.to_tlv(tag, flags.non_critical, flags.forward)?);
            }
        }
        Ok(())
    }

    fn is_composite(&self) -> bool {
        false
    }
}

struct CompositeListField<T, L> {
    get: fn(&T) -> Option<&L>,
    slot: fn(&mut T) -> &mut Option<L>,
}

impl<T, L> ListSlot<T> for CompositeListField<T, L>
where
    L: TlvList,
    L::Item: TlvObject,
{
    fn decode_element(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()> {
        let mut item = <L::Item as Default>::default();
        dec.extract_nested(&mut item, node, <L::Item as TlvObject>::template())?;
        (self.slot)(owner).get_or_insert_with(L::new_list).append(item);
        Ok(())
    }

    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags, out: &mut Vec<Tlv>) -> Result<()> {
        if let Some(list) = (self.get)(owner) {
            for item in list.iter() {
                out.push(enc.construct_nested(item, <L::Item as TlvObject>::template(), tag, flags)?);
            }
        }
        Ok(())
    }

    fn is_composite(&self) -> bool {
        true
    }
}

struct CallbackField<T, V> {
    get: fn(&T) -> Option<&V>,
    encode: fn(&mut Encoder<'_>, &V, &mut Tlv) -> Result<()>,
    decode: fn(&mut Decoder<'_>, &Tlv, &mut T) -> Result<()>,
}

impl<T, V> CallbackSlot<T> for CallbackField<T, V> {
    fn decode(&self, dec: &mut Decoder<'_>, owner: &mut T, node: &Tlv) -> Result<()> {
        (self.decode)(dec, node, owner)
    }

    fn encode(&self, enc: &mut Encoder<'_>, owner: &T, tag: u16, flags: Flags) -> Result<Option<Tlv>> {
        match (self.get)(owner) {
            Some(v) => {
                let mut node = Tlv::new(tag, flags.non_critical, flags.forward);
                (self.encode)(enc, v, &mut node)?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Sample {
        a: Option<u64>,
        pos: Option<u64>,
        names: Option<Vec<crate::value::Utf8String>>,
    }

    fn sample_template() -> Template<Sample> {
        Template::<Sample>::builder("Sample")
            .native_int(0x01, Flags::NON_CRITICAL, |p| p.a, |p, v| p.a = Some(v))
            .seek_pos(0x02, |p, v| p.pos = Some(v))
            .object_list(0x03, Flags::FORWARD, |p| p.names.as_ref(), |p| &mut p.names)
            .build()
    }

    #[test]
    fn builder_keeps_declaration_order() {
        let t = sample_template();
        assert_eq!(t.name(), "Sample");
        let tags: Vec<u16> = t.fields().iter().map(|f| f.tag).collect();
        assert_eq!(tags, vec![0x01, 0x02, 0x03]);
        assert_eq!(t.fields()[0].flags, Flags::NON_CRITICAL);
        assert!(t.fields()[2].multiple);
        assert!(!t.fields()[0].multiple);
        assert_eq!(t.fields()[1].kind.name(), "seek pos");
        assert_eq!(t.fields()[2].kind.name(), "object list");
    }

    #[test]
    fn find_returns_first_match() {
        let t = sample_template();
        assert_eq!(t.find(0x03).map(|(i, _)| i), Some(2));
        assert!(t.find(0x04).is_none());
    }

    #[test]
    fn multiple_modifier_applies_to_last_field() {
        let t = Template::<Sample>::builder("Sample")
            .native_int(0x01, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .multiple()
            .build();
        assert!(t.fields()[0].multiple);
        let dbg = format!("{:?}", t);
        assert!(dbg.contains("Template(Sample)"));
        assert!(dbg.contains("0x01 native int"));
    }
}
