//! Output kind resolution.
//!
//! Rules, in priority order:
//!
//! 1. an explicit [`KindHint`] (force element / force text) always wins;
//! 2. nested structures, lists, sets, maps and polymorphic values are elements;
//! 3. primitives default to attributes;
//! 4. a field whose shape is not known stays [`OutputKind::Unknown`] until the
//!    first write, where [`resolve_on_write`] settles it.

use std::fmt;

use crate::descriptor::{FieldShape, KindHint, OutputKind};

/// How a value presents itself when it is written or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueForm {
    /// A single string-convertible value.
    Scalar,
    /// Nested content: a structure, a collection or a polymorphic value.
    Nested,
}

/// A value whose form contradicts the kind its field was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindConflict {
    pub kind: OutputKind,
    pub form: ValueForm,
}

impl fmt::Display for KindConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {:?} value cannot be written as {:?}", self.form, self.kind)
    }
}

impl std::error::Error for KindConflict {}

/// Static resolution for a field descriptor.
pub fn resolve_kind(shape: &FieldShape, hint: Option<KindHint>, has_child_name: bool) -> OutputKind {
    match hint {
        Some(KindHint::Element) => return OutputKind::Element,
        Some(KindHint::Text) => return OutputKind::Text,
        Some(KindHint::Attribute) | None => {}
    }
    match shape {
        FieldShape::Structure(_)
        | FieldShape::List(_)
        | FieldShape::Map(_)
        | FieldShape::Polymorphic(_) => OutputKind::Element,
        FieldShape::Primitive => OutputKind::Attribute,
        FieldShape::Unknown if has_child_name => OutputKind::Element,
        FieldShape::Unknown if hint == Some(KindHint::Attribute) => OutputKind::Attribute,
        FieldShape::Unknown => OutputKind::Unknown,
    }
}

/// The single lazy resolution step, taken when a value is actually written.
///
/// `Unknown` becomes an attribute for scalars and escalates to an element for
/// nested content. Statically resolved kinds never change: a nested value in
/// an attribute or text slot is a conflict.
pub fn resolve_on_write(kind: OutputKind, form: ValueForm) -> Result<OutputKind, KindConflict> {
    match (kind, form) {
        (OutputKind::Unknown, ValueForm::Scalar) => Ok(OutputKind::Attribute),
        (OutputKind::Unknown, ValueForm::Nested) => Ok(OutputKind::Element),
        (OutputKind::Element, _) => Ok(OutputKind::Element),
        (kind, ValueForm::Scalar) => Ok(kind),
        (kind, ValueForm::Nested) => Err(KindConflict { kind, form }),
    }
}
