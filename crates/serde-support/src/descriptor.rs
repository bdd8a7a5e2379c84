//! Structure and field descriptors.
//!
//! A [`StructureDescriptor`] is the static description of one structured value
//! type: its serialized tag, an optional container-children name, and the
//! ordered list of its fields. Descriptors are built once per type (see
//! [`crate::registry`]) and never change afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::name::QualifiedName;
use crate::policy;
use crate::registry::{XmlDescribe, descriptor_of};

/// Where a field's value goes in the XML output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Attribute,
    Element,
    Text,
    /// Not decided yet; settled on first write.
    Unknown,
}

impl OutputKind {
    /// Element or text content, as opposed to an attribute.
    pub fn is_content(self) -> bool {
        matches!(self, OutputKind::Element | OutputKind::Text)
    }
}

/// Explicit designation attached to a field declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindHint {
    /// Force a child element even for primitive values.
    Element,
    /// Force element text content.
    Text,
    /// Prefer an attribute. Nested shapes still become elements.
    Attribute,
}

/// Lazily resolved reference to another type's descriptor.
///
/// Holding a function pointer instead of the descriptor itself keeps
/// descriptor construction non-recursive, so self-referential types work.
#[derive(Clone, Copy)]
pub struct DescriptorRef {
    resolve: fn() -> Arc<StructureDescriptor>,
    type_name: &'static str,
}

impl DescriptorRef {
    pub fn of<T: XmlDescribe + 'static>() -> Self {
        Self {
            resolve: descriptor_of::<T>,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn resolve(&self) -> Arc<StructureDescriptor> {
        (self.resolve)()
    }
}

impl fmt::Debug for DescriptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescriptorRef({})", self.type_name)
    }
}

/// The value shape of a field.
#[derive(Debug, Clone)]
pub enum FieldShape {
    Primitive,
    /// A nested structure, with its descriptor when one is registered.
    Structure(Option<DescriptorRef>),
    /// A list or set of items of the given shape.
    List(Box<FieldShape>),
    /// A map with primitive keys and values of the given shape.
    Map(Box<FieldShape>),
    /// One of several tagged variants.
    Polymorphic(Arc<PolymorphicDescriptor>),
    Unknown,
}

impl FieldShape {
    pub fn structure<T: XmlDescribe + 'static>() -> Self {
        FieldShape::Structure(Some(DescriptorRef::of::<T>()))
    }

    pub fn list(item: FieldShape) -> Self {
        FieldShape::List(Box::new(item))
    }

    pub fn map(value: FieldShape) -> Self {
        FieldShape::Map(Box::new(value))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldShape::List(_) | FieldShape::Map(_))
    }

    /// The descriptor of a structure-shaped value, if registered.
    pub fn descriptor(&self) -> Option<Arc<StructureDescriptor>> {
        match self {
            FieldShape::Structure(Some(reference)) => Some(reference.resolve()),
            _ => None,
        }
    }

    /// The variants of a transparent polymorphic shape, whose values are
    /// written under their variant tags instead of the field name.
    pub fn transparent_variants(&self) -> Option<&PolymorphicDescriptor> {
        match self {
            FieldShape::Polymorphic(descriptor) if descriptor.is_transparent() => Some(descriptor),
            _ => None,
        }
    }

    /// The shape of the items of a collection; `Unknown` for anything else.
    pub fn item_shape(&self) -> FieldShape {
        match self {
            FieldShape::List(item) | FieldShape::Map(item) => (**item).clone(),
            _ => FieldShape::Unknown,
        }
    }
}

/// One alternative of a polymorphic value.
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    name: String,
    discriminator: String,
    tag: QualifiedName,
    shape: FieldShape,
}

impl VariantDescriptor {
    /// A variant named as the value model names it. The discriminator and the
    /// payload tag default to that name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            discriminator: name.clone(),
            tag: QualifiedName::local(name.clone()),
            name,
            shape: FieldShape::Unknown,
        }
    }

    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = discriminator.into();
        self
    }

    pub fn tag(mut self, tag: QualifiedName) -> Self {
        self.tag = tag;
        self
    }

    pub fn shape(mut self, shape: FieldShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminator_value(&self) -> &str {
        &self.discriminator
    }

    pub fn tag_name(&self) -> &QualifiedName {
        &self.tag
    }

    pub fn payload_shape(&self) -> &FieldShape {
        &self.shape
    }
}

/// The variants a polymorphic field may hold.
#[derive(Debug, Clone, Default)]
pub struct PolymorphicDescriptor {
    transparent: bool,
    variants: Vec<VariantDescriptor>,
}

impl PolymorphicDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inline the variant's own tag and omit the `type` discriminator.
    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    pub fn variant(mut self, variant: VariantDescriptor) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn variants(&self) -> &[VariantDescriptor] {
        &self.variants
    }

    pub fn by_name(&self, name: &str) -> Option<&VariantDescriptor> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn by_discriminator(&self, discriminator: &str) -> Option<&VariantDescriptor> {
        self.variants
            .iter()
            .find(|v| v.discriminator == discriminator)
    }
}

/// One field of a structure.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    index: usize,
    declared_name: String,
    explicit_name: Option<QualifiedName>,
    resolved_name: QualifiedName,
    hint: Option<KindHint>,
    kind: OutputKind,
    optional: bool,
    child_name: Option<QualifiedName>,
    shape: FieldShape,
}

impl FieldDescriptor {
    /// A field as the value model declares it. Without further configuration
    /// its shape and kind are unknown.
    pub fn new(declared_name: impl Into<String>) -> Self {
        let declared_name = declared_name.into();
        Self {
            index: 0,
            resolved_name: QualifiedName::local(declared_name.clone()),
            declared_name,
            explicit_name: None,
            hint: None,
            kind: OutputKind::Unknown,
            optional: false,
            child_name: None,
            shape: FieldShape::Unknown,
        }
    }

    pub fn primitive(self) -> Self {
        self.shape(FieldShape::Primitive)
    }

    pub fn structure<T: XmlDescribe + 'static>(self) -> Self {
        self.shape(FieldShape::structure::<T>())
    }

    pub fn list(self, item: FieldShape) -> Self {
        self.shape(FieldShape::list(item))
    }

    pub fn map(self, value: FieldShape) -> Self {
        self.shape(FieldShape::map(value))
    }

    pub fn polymorphic(self, descriptor: PolymorphicDescriptor) -> Self {
        self.shape(FieldShape::Polymorphic(Arc::new(descriptor)))
    }

    pub fn shape(mut self, shape: FieldShape) -> Self {
        self.shape = shape;
        self
    }

    /// Force a child element.
    pub fn element(mut self) -> Self {
        self.hint = Some(KindHint::Element);
        self
    }

    /// Force element text content.
    pub fn text(mut self) -> Self {
        self.hint = Some(KindHint::Text);
        self
    }

    /// Prefer an attribute, settling an unknown shape up front.
    pub fn attribute(mut self) -> Self {
        self.hint = Some(KindHint::Attribute);
        self
    }

    /// Absence in the input is not an error.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Serialized name; by default the declared name in the owner's namespace.
    pub fn named(mut self, name: QualifiedName) -> Self {
        self.explicit_name = Some(name);
        self
    }

    /// Per-item tag of a collection, which then gets a wrapper element named
    /// after the field.
    pub fn child_name(mut self, name: QualifiedName) -> Self {
        self.child_name = Some(name);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn resolved_name(&self) -> &QualifiedName {
        &self.resolved_name
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn child_name_override(&self) -> Option<&QualifiedName> {
        self.child_name.as_ref()
    }

    pub fn value_shape(&self) -> &FieldShape {
        &self.shape
    }

    fn finish(mut self, index: usize, owner: &QualifiedName) -> Self {
        self.index = index;
        self.resolved_name = match self.explicit_name.take() {
            Some(name) => name,
            None => owner.sibling(self.declared_name.clone()),
        };
        if !matches!(
            self.shape,
            FieldShape::List(_) | FieldShape::Map(_) | FieldShape::Unknown
        ) {
            self.child_name = None;
        }
        self.kind = policy::resolve_kind(&self.shape, self.hint, self.child_name.is_some());
        self
    }
}

/// Static description of one structured value type.
#[derive(Debug, Clone)]
pub struct StructureDescriptor {
    type_name: String,
    tag: QualifiedName,
    child_name: Option<QualifiedName>,
    fields: Vec<FieldDescriptor>,
    by_declared_name: HashMap<String, usize>,
    last_inverted_index: Option<usize>,
    value_child: Option<usize>,
}

impl StructureDescriptor {
    pub fn builder(type_name: impl Into<String>) -> StructureBuilder {
        let type_name = type_name.into();
        StructureBuilder {
            tag: QualifiedName::local(type_name.clone()),
            type_name,
            child_name: None,
            fields: Vec::new(),
        }
    }

    /// Descriptor for a type nothing was registered for: every field unknown
    /// and optional, named in the namespace of the element it is read from.
    pub fn synthesized(type_name: &str, tag: &QualifiedName, field_names: &[&str]) -> Self {
        field_names
            .iter()
            .fold(
                StructureDescriptor::builder(type_name).tag(tag.clone()),
                |builder, name| builder.field(FieldDescriptor::new(*name).optional()),
            )
            .build()
    }

    /// The two-field pseudo-structure used for map entries: a `key` attribute
    /// and a `value` whose kind follows the value shape.
    pub fn map_entry(tag: &QualifiedName, value_shape: FieldShape) -> Self {
        StructureDescriptor::builder("entry")
            .tag(tag.clone())
            .field(FieldDescriptor::new(MAP_KEY).primitive())
            .field(FieldDescriptor::new(MAP_VALUE).shape(value_shape).optional())
            .build()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn tag(&self) -> &QualifiedName {
        &self.tag
    }

    pub fn child_name(&self) -> Option<&QualifiedName> {
        self.child_name.as_ref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of_declared(&self, declared_name: &str) -> Option<usize> {
        self.by_declared_name.get(declared_name).copied()
    }

    /// Highest index of a field that may be written as an attribute while some
    /// earlier field may already have produced element or text content.
    ///
    /// Unknown fields count both ways since their kind is settled late.
    pub fn last_inverted_index(&self) -> Option<usize> {
        self.last_inverted_index
    }

    /// The field that receives element text: the only field of a single-field
    /// structure, or else the only field designated as text.
    pub fn value_child(&self) -> Option<usize> {
        self.value_child
    }

    /// Serialized names of all fields, rendered and sorted. Never empty: a
    /// structure without fields offers its own tag.
    pub fn candidate_names(&self) -> Vec<String> {
        if self.fields.is_empty() {
            return vec![self.tag.to_string()];
        }
        let mut names: Vec<String> = self
            .fields
            .iter()
            .map(|f| f.resolved_name.to_string())
            .collect();
        names.sort();
        names
    }
}

/// Declared name of the map entry key field.
pub const MAP_KEY: &str = "key";

/// Declared name of the map entry value field.
pub const MAP_VALUE: &str = "value";

pub struct StructureBuilder {
    type_name: String,
    tag: QualifiedName,
    child_name: Option<QualifiedName>,
    fields: Vec<FieldDescriptor>,
}

impl StructureBuilder {
    /// The type's own serialized tag; defaults to the type name.
    pub fn tag(mut self, tag: QualifiedName) -> Self {
        self.tag = tag;
        self
    }

    /// Item tag used when the type is a container serialized at top level.
    pub fn child_name(mut self, name: QualifiedName) -> Self {
        self.child_name = Some(name);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> StructureDescriptor {
        let tag = self.tag;
        let fields: Vec<FieldDescriptor> = self
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| field.finish(index, &tag))
            .collect();

        let by_declared_name = fields
            .iter()
            .map(|f| (f.declared_name.clone(), f.index))
            .collect();

        let mut seen_content = false;
        let mut last_inverted_index = None;
        for field in &fields {
            match field.kind {
                OutputKind::Element | OutputKind::Text => seen_content = true,
                OutputKind::Attribute => {
                    if seen_content {
                        last_inverted_index = Some(field.index);
                    }
                }
                OutputKind::Unknown => {
                    if seen_content {
                        last_inverted_index = Some(field.index);
                    }
                    seen_content = true;
                }
            }
        }

        let value_child = if fields.len() == 1 {
            Some(0)
        } else {
            let mut text_fields = fields.iter().filter(|f| f.kind == OutputKind::Text);
            match (text_fields.next(), text_fields.next()) {
                (Some(field), None) => Some(field.index),
                _ => None,
            }
        };

        StructureDescriptor {
            type_name: self.type_name,
            tag,
            child_name: self.child_name,
            fields,
            by_declared_name,
            last_inverted_index,
            value_child,
        }
    }
}
