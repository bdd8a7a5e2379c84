//! Name lookup for one decode frame.

use std::collections::HashMap;

use tracing::trace;
use weft_serde_support::{
    FieldDescriptor, FieldShape, NamespaceContext, NamespaceScopes, QualifiedName,
    StructureDescriptor, VariantDescriptor,
};

/// The default namespace of the element a frame decodes, captured when the
/// frame opens so later lookups are not affected by child scopes.
#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    default_namespace: Option<String>,
}

impl FrameContext {
    pub fn capture(scopes: &NamespaceScopes) -> Self {
        Self {
            default_namespace: scopes.namespace_uri("").map(str::to_string),
        }
    }
}

impl NamespaceContext for FrameContext {
    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        if prefix.is_empty() {
            self.default_namespace.as_deref()
        } else {
            None
        }
    }
}

/// Normalized name to field index, built on the first lookup.
#[derive(Debug, Default)]
pub struct NameMap {
    entries: Option<HashMap<QualifiedName, usize>>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the field whose serialized name normalizes to the same name as
    /// `name`. `name` must already be normalized.
    pub fn index_of(
        &mut self,
        descriptor: &StructureDescriptor,
        context: &FrameContext,
        name: &QualifiedName,
    ) -> Option<usize> {
        let entries = self.entries.get_or_insert_with(|| {
            trace!(
                structure = descriptor.type_name(),
                fields = descriptor.len(),
                "building name map"
            );
            descriptor
                .fields()
                .iter()
                .flat_map(|field| {
                    element_names(field)
                        .into_iter()
                        .map(move |name| (name.normalize(context), field.index()))
                })
                .collect()
        });
        entries.get(name).copied()
    }

    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }
}

/// Names a field's content can appear under: its own name, plus the variant
/// tags of a transparent polymorphic value or of the items of an unwrapped
/// list of them.
fn element_names(field: &FieldDescriptor) -> Vec<&QualifiedName> {
    let shape = field.value_shape();
    let variants = match shape {
        FieldShape::List(item) if field.child_name_override().is_none() => {
            item.transparent_variants()
        }
        _ => shape.transparent_variants(),
    };
    std::iter::once(field.resolved_name())
        .chain(
            variants
                .into_iter()
                .flat_map(|p| p.variants().iter().map(VariantDescriptor::tag_name)),
        )
        .collect()
}
