//! Template linter: checks a template table for descriptors that can never behave as
//! declared.
//!
//! ## Rules
//!
//! - **Duplicate tag**: two descriptors share a tag; the later one is never matched.
//! - **Tag out of range**: tag does not fit the 13-bit TLV16 tag space.
//! - **Multiple scalar**: `multiple` on a non-list kind; later occurrences overwrite earlier ones.
//! - **Seek pos flags**: seek-position descriptors are decode-only, flags have no effect.
//!
//! [`TemplateBuilder::build`](crate::template::TemplateBuilder::build) runs the linter and
//! logs findings through `tracing`.

use crate::template::{Flags, FieldKind, Template};
use crate::walk::MAX_TAG;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    DuplicateTag,
    TagOutOfRange,
    MultipleScalar,
    SeekPosFlags,
}

/// A single lint message, located by field index and tag.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub index: usize,
    pub tag: u16,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

/// Run all lint rules on `template`. Returns messages in field order.
pub fn lint_template<T>(template: &Template<T>) -> Vec<LintMessage>
where
    T: 'static,
{
    let mut out = Vec::new();
    let fields = template.fields();

    for (i, f) in fields.iter().enumerate() {
        if let Some(first) = fields[..i].iter().position(|g| g.tag == f.tag) {
            out.push(LintMessage {
                index: i,
                tag: f.tag,
                rule: LintRule::DuplicateTag,
                severity: Severity::Error,
                message: format!(
                    "{} field #{} repeats tag 0x{:02x} of field #{} and is unreachable",
                    f.kind.name(),
                    i,
                    f.tag,
                    first
                ),
            });
        }

        if f.tag > MAX_TAG {
            out.push(LintMessage {
                index: i,
                tag: f.tag,
                rule: LintRule::TagOutOfRange,
                severity: Severity::Error,
                message: format!("tag 0x{:x} exceeds maximum 0x{:x}", f.tag, MAX_TAG),
            });
        }

        let scalar = !f.kind.is_list() && !matches!(f.kind, FieldKind::Callback(_));
        if f.multiple && scalar {
            out.push(LintMessage {
                index: i,
                tag: f.tag,
                rule: LintRule::MultipleScalar,
                severity: Severity::Warning,
                message: format!("{} field allows repeats; only the last value is kept", f.kind.name()),
            });
        }

        if matches!(f.kind, FieldKind::SeekPos { .. }) && f.flags != Flags::NONE {
            out.push(LintMessage {
                index: i,
                tag: f.tag,
                rule: LintRule::SeekPosFlags,
                severity: Severity::Warning,
                message: "seek-position fields are never encoded; flags are ignored".to_string(),
            });
        }
    }

    out
}

/// True if `template` has no error-level findings.
pub fn is_clean<T: 'static>(template: &Template<T>) -> bool {
    lint_template(template).iter().all(|m| m.severity != Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct P {
        a: Option<u64>,
    }

    #[test]
    fn clean_template() {
        let t = Template::<P>::builder("P")
            .native_int(0x01, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .seek_pos(0x02, |p, v| p.a = Some(v))
            .build();
        assert!(lint_template(&t).is_empty());
        assert!(is_clean(&t));
    }

    #[test]
    fn duplicate_and_range() {
        let t = Template::<P>::builder("P")
            .native_int(0x01, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .native_int(0x01, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .native_int(0x2000, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .build();
        let msgs = lint_template(&t);
        let rules: Vec<LintRule> = msgs.iter().map(|m| m.rule).collect();
        assert_eq!(rules, vec![LintRule::DuplicateTag, LintRule::TagOutOfRange]);
        assert_eq!(msgs[0].index, 1);
        assert!(!is_clean(&t));
    }

    #[test]
    fn warnings() {
        let t = Template::<P>::builder("P")
            .native_int(0x01, Flags::NONE, |p| p.a, |p, v| p.a = Some(v))
            .multiple()
            .build();
        let msgs = lint_template(&t);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].rule, LintRule::MultipleScalar);
        assert_eq!(msgs[0].severity, Severity::Warning);
        assert!(is_clean(&t));
    }
}
