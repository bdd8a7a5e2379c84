//! XML deserialization implementation using custom serde::Deserializer.
//!
//! Decoding mirrors the encoder: every value is read from a [`Source`] (an
//! attribute value, element text, a whole element, or nothing at all) into a
//! [`ReadSlot`] describing the field it fills. Structures are read by a
//! state machine that walks attributes, then child content, then reports
//! the fields that never appeared.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Arc;

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use tracing::{debug, trace};
use weft_serde_support::{
    FieldDescriptor, FieldShape, MAP_KEY, OutputKind, PolymorphicDescriptor,
    QualifiedName, StructureDescriptor, VariantDescriptor, XmlDescribe,
};

use super::names::{FrameContext, NameMap};
use super::reader::{EventType, StartElement, XmlAttribute, XmlEvent, XmlEventReader};
use super::utils;
use crate::config::{UnknownContentPolicy, XmlCodec, XmlConfig};
use crate::error::{Result, SerdeError};

/// Deserialize a value from an XML string.
pub fn from_xml_str<T>(xml: &str) -> Result<T>
where
    T: DeserializeOwned + XmlDescribe + 'static,
{
    XmlCodec::default().from_str(xml)
}

/// Deserialize a value from XML bytes.
pub fn from_xml_slice<T>(xml: &[u8]) -> Result<T>
where
    T: DeserializeOwned + XmlDescribe + 'static,
{
    XmlCodec::default().from_slice(xml)
}

/// Deserialize a value from an XML reader.
pub fn from_xml_reader<R, T>(reader: R) -> Result<T>
where
    R: BufRead,
    T: DeserializeOwned + XmlDescribe + 'static,
{
    XmlCodec::default().from_reader(reader)
}

/// Decodes root values from one input stream.
pub struct XmlDeserializer<R: BufRead> {
    reader: XmlEventReader<R>,
    unknown: UnknownContentPolicy,
    allow_mixed_text: bool,
}

impl<R: BufRead> XmlDeserializer<R> {
    pub fn new(input: R, config: &XmlConfig) -> Self {
        Self {
            reader: XmlEventReader::new(input),
            unknown: config.unknown_content.clone(),
            allow_mixed_text: config.allow_mixed_text,
        }
    }

    /// Reads the root element described by `descriptor`.
    pub fn deserialize<T: DeserializeOwned>(
        &mut self,
        descriptor: Arc<StructureDescriptor>,
    ) -> Result<T> {
        let start = self.reader.require_start(descriptor.tag())?;
        T::deserialize(ValueDeserializer::new(
            self,
            Source::Element(start),
            ReadSlot::root(descriptor),
        ))
    }

    /// Requires that the document ends after the root element.
    pub fn end(&mut self) -> Result<()> {
        self.reader.expect_end_document()
    }

    /// Applies the unknown-content policy to a name no field accepts.
    /// Returns `Ok` when the content should be skipped.
    fn unknown_content(
        &self,
        name: &QualifiedName,
        event: EventType,
        candidates: impl FnOnce() -> Vec<String>,
    ) -> Result<()> {
        match &self.unknown {
            UnknownContentPolicy::Fail => Err(SerdeError::UnknownName {
                name: name.to_string(),
                candidates: candidates(),
            }),
            UnknownContentPolicy::Ignore => {
                debug!(name = %name, ?event, "skipping unknown content");
                Ok(())
            }
            UnknownContentPolicy::Custom(handler) => handler(name, event),
        }
    }
}

/// Where a value is read from.
#[derive(Debug)]
enum Source {
    Attribute(String),
    /// Text content of the enclosing element.
    Text(String),
    /// An element whose start tag has been consumed.
    Element(StartElement),
    /// Nothing: an absent collection field or map value.
    Missing,
}

/// What a value is read into.
#[derive(Debug, Clone)]
struct ReadSlot {
    name: QualifiedName,
    shape: FieldShape,
    child_name: Option<QualifiedName>,
    descriptor: Option<Arc<StructureDescriptor>>,
    root: bool,
}

impl ReadSlot {
    fn root(descriptor: Arc<StructureDescriptor>) -> Self {
        Self {
            name: descriptor.tag().clone(),
            shape: FieldShape::Unknown,
            child_name: descriptor.child_name().cloned(),
            descriptor: Some(descriptor),
            root: true,
        }
    }

    fn field(field: &FieldDescriptor) -> Self {
        Self {
            name: field.resolved_name().clone(),
            shape: field.value_shape().clone(),
            child_name: field.child_name_override().cloned(),
            descriptor: field.value_shape().descriptor(),
            root: false,
        }
    }

    fn item(name: QualifiedName, shape: FieldShape) -> Self {
        Self {
            name,
            descriptor: shape.descriptor(),
            shape,
            child_name: None,
            root: false,
        }
    }

    /// See the encoder: a root descriptor with a single collection field
    /// describes the collection a root newtype wraps.
    fn newtype_inner(mut self) -> Self {
        if !self.root {
            return self;
        }
        let only_collection = match self.descriptor.as_deref().map(StructureDescriptor::fields) {
            Some([field]) if field.value_shape().is_collection() => Some(field.clone()),
            _ => None,
        };
        if let Some(field) = only_collection {
            self.shape = field.value_shape().clone();
            self.child_name = self
                .child_name
                .or_else(|| field.child_name_override().cloned());
            self.descriptor = None;
        }
        self
    }

    fn polymorphic(&self) -> Option<&PolymorphicDescriptor> {
        match &self.shape {
            FieldShape::Polymorphic(descriptor) => Some(descriptor.as_ref()),
            _ => None,
        }
    }

    /// Variant name for a discriminator value; undescribed enums use the
    /// variant name itself.
    fn variant_for_discriminator(&self, discriminator: &str) -> String {
        self.polymorphic()
            .and_then(|p| p.by_discriminator(discriminator))
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| discriminator.to_string())
    }

    fn payload_slot(&self, variant: &str) -> ReadSlot {
        let described = self
            .polymorphic()
            .and_then(|p| p.by_name(variant))
            .cloned()
            .unwrap_or_else(|| VariantDescriptor::new(variant).tag(self.name.sibling(variant)));
        ReadSlot::item(described.tag_name().clone(), described.payload_shape().clone())
    }
}

/// Whether a repeated element belongs to the collection whose items are
/// described by `item`.
fn accepts(item: &ReadSlot, context: &FrameContext, name: &QualifiedName) -> bool {
    let name = name.normalize(context);
    match item.shape.transparent_variants() {
        Some(variants) => variants
            .variants()
            .iter()
            .any(|v| v.tag_name().normalize(context) == name),
        None => item.name.normalize(context) == name,
    }
}

/// Deserializes one value from its source.
struct ValueDeserializer<'a, R: BufRead> {
    de: &'a mut XmlDeserializer<R>,
    source: Source,
    slot: ReadSlot,
}

impl<'a, R: BufRead> ValueDeserializer<'a, R> {
    fn new(de: &'a mut XmlDeserializer<R>, source: Source, slot: ReadSlot) -> Self {
        Self { de, source, slot }
    }

    fn scalar(self) -> Result<String> {
        if self.slot.root {
            return Err(SerdeError::UnsupportedTopLevel(format!(
                "primitive value in <{}>",
                self.slot.name.to_cname()
            )));
        }
        match self.source {
            Source::Attribute(value) | Source::Text(value) => Ok(value),
            Source::Element(_) => self.de.reader.read_simple_text(),
            Source::Missing => Err(SerdeError::Malformed(format!(
                "no value for {}",
                self.slot.name
            ))),
        }
    }

    /// Sets up iteration over the items of a list or the entries of a map.
    /// `None` means the collection is absent and therefore empty.
    fn collection(self, what: &str) -> Result<(&'a mut XmlDeserializer<R>, Option<Items>)> {
        let context = FrameContext::capture(self.de.reader.scopes());
        let item_shape = self.slot.shape.item_shape();
        let items = match (self.source, self.slot.child_name) {
            (Source::Missing, _) => None,
            (Source::Element(_), Some(child)) => Some(Items {
                mode: ItemsMode::Wrapped { done: false },
                item: ReadSlot::item(child, item_shape),
                context,
            }),
            (Source::Element(_), None) if self.slot.root => {
                return Err(SerdeError::UnsupportedTopLevel(format!(
                    "{} <{}> without a child name",
                    what,
                    self.slot.name.to_cname()
                )));
            }
            (Source::Element(first), None) => Some(Items {
                mode: ItemsMode::Siblings { first: Some(first) },
                item: ReadSlot::item(self.slot.name, item_shape),
                context,
            }),
            (Source::Attribute(value) | Source::Text(value), _) => {
                return Err(SerdeError::Malformed(format!(
                    "{} cannot be read from text {:?}",
                    what, value
                )));
            }
        };
        Ok((self.de, items))
    }
}

macro_rules! deserialize_number {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            let text = self.scalar()?;
            visitor.$visit(utils::parse_scalar::<$ty>(&text, stringify!($ty))?)
        }
    };
}

impl<'de, 'a, R: BufRead> de::Deserializer<'de> for ValueDeserializer<'a, R> {
    type Error = SerdeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.source {
            Source::Missing => visitor.visit_none(),
            Source::Element(_) if self.slot.descriptor.is_some() => {
                self.deserialize_map(visitor)
            }
            _ => visitor.visit_string(self.scalar()?),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let text = self.scalar()?;
        visitor.visit_bool(utils::parse_bool(&text)?)
    }

    deserialize_number!(deserialize_i8, visit_i8, i8);
    deserialize_number!(deserialize_i16, visit_i16, i16);
    deserialize_number!(deserialize_i32, visit_i32, i32);
    deserialize_number!(deserialize_i64, visit_i64, i64);
    deserialize_number!(deserialize_i128, visit_i128, i128);
    deserialize_number!(deserialize_u8, visit_u8, u8);
    deserialize_number!(deserialize_u16, visit_u16, u16);
    deserialize_number!(deserialize_u32, visit_u32, u32);
    deserialize_number!(deserialize_u64, visit_u64, u64);
    deserialize_number!(deserialize_u128, visit_u128, u128);
    deserialize_number!(deserialize_f32, visit_f32, f32);
    deserialize_number!(deserialize_f64, visit_f64, f64);

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let text = self.scalar()?;
        visitor.visit_char(utils::parse_char(&text)?)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.scalar()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.scalar()?)
    }

    fn deserialize_bytes<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(SerdeError::Malformed(
            "byte arrays have no XML representation".to_string(),
        ))
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.source {
            Source::Missing => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if let Source::Element(_) = self.source {
            self.de.reader.skip_element()?;
        }
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let slot = self.slot.newtype_inner();
        visitor.visit_newtype_struct(ValueDeserializer::new(self.de, self.source, slot))
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let (de, items) = self.collection("list")?;
        let Some(items) = items else {
            return visitor.visit_seq(EmptyAccess);
        };
        let mut access = SeqItems { de, items };
        let value = visitor.visit_seq(&mut access)?;
        access.items.finish(access.de)?;
        Ok(value)
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(SerdeError::Malformed(
            "tuples have no XML representation".to_string(),
        ))
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(SerdeError::Malformed(format!(
            "tuple struct {} has no XML representation",
            name
        )))
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        // A map-typed value that has a descriptor is a structure.
        if let (Source::Element(_), Some(descriptor)) = (&self.source, &self.slot.descriptor) {
            let name = descriptor.type_name().to_string();
            return self.read_structure(&name, &[], visitor);
        }

        let (de, items) = self.collection("map")?;
        let Some(mut items) = items else {
            return visitor.visit_map(EmptyAccess);
        };
        let entry = StructureDescriptor::map_entry(&items.item.name, items.item.shape.clone());
        let [key, value] = entry.fields() else {
            return Err(SerdeError::Malformed(
                "map entries have exactly two fields".to_string(),
            ));
        };
        let (key, value) = (ReadSlot::field(key), ReadSlot::field(value));
        items.item.shape = FieldShape::Unknown;

        let mut access = MapEntries {
            de,
            items,
            key,
            value,
            pending: None,
        };
        let result = visitor.visit_map(&mut access)?;
        access.items.finish(access.de)?;
        Ok(result)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.read_structure(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.slot.root {
            return Err(SerdeError::UnsupportedTopLevel(format!(
                "enum in <{}>",
                self.slot.name.to_cname()
            )));
        }
        let start = match self.source {
            Source::Attribute(value) | Source::Text(value) => {
                return visitor.visit_enum(unit_variant(&self.slot, &value));
            }
            Source::Missing => {
                return Err(SerdeError::Malformed(format!(
                    "no value for {}",
                    self.slot.name
                )));
            }
            Source::Element(start) => start,
        };

        if let Some(variants) = self.slot.shape.transparent_variants() {
            let context = FrameContext::capture(self.de.reader.scopes());
            let name = start.name.normalize(&context);
            let matched = variants
                .variants()
                .iter()
                .find(|v| v.tag_name().normalize(&context) == name);
            if let Some(variant) = matched {
                return visitor.visit_enum(ElementVariant {
                    de: self.de,
                    slot: ReadSlot::item(variant.tag_name().clone(), variant.payload_shape().clone()),
                    variant: variant.name().to_string(),
                    payload: Source::Element(start),
                    close_wrapper: false,
                });
            }
            // Unit variants keep the field name even when transparent.
            if name != self.slot.name.normalize(&context) {
                return Err(SerdeError::UnknownName {
                    name: start.name.to_string(),
                    candidates: variant_tags(variants),
                });
            }
        }

        let Some(discriminator) = start.attribute(utils::TYPE_ATTRIBUTE) else {
            // Unit variants written as element text.
            let text = self.de.reader.read_simple_text()?;
            return visitor.visit_enum(unit_variant(&self.slot, &text));
        };
        let variant = self.slot.variant_for_discriminator(discriminator);
        let slot = self.slot.payload_slot(&variant);
        let (payload, close_wrapper) = match self.de.reader.next_tag()? {
            XmlEvent::StartElement(payload) => (Source::Element(payload), true),
            _ => (Source::Missing, false),
        };
        visitor.visit_enum(ElementVariant {
            de: self.de,
            slot,
            variant,
            payload,
            close_wrapper,
        })
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }
}

impl<'a, R: BufRead> ValueDeserializer<'a, R> {
    fn read_structure<'de, V>(
        self,
        name: &str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let start = match self.source {
            Source::Element(start) => start,
            Source::Missing => {
                return Err(SerdeError::Malformed(format!(
                    "no element for {}",
                    self.slot.name
                )));
            }
            Source::Attribute(value) | Source::Text(value) => {
                return Err(SerdeError::Malformed(format!(
                    "structure {} cannot be read from text {:?}",
                    name, value
                )));
            }
        };
        let descriptor = match self.slot.descriptor {
            Some(descriptor) => descriptor,
            None => Arc::new(StructureDescriptor::synthesized(name, &start.name, fields)),
        };
        visitor.visit_map(StructAccess::new(self.de, start, descriptor))
    }
}

fn unit_variant(slot: &ReadSlot, discriminator: &str) -> StringDeserializer<SerdeError> {
    slot.variant_for_discriminator(discriminator)
        .into_deserializer()
}

fn variant_tags(variants: &PolymorphicDescriptor) -> Vec<String> {
    let mut tags: Vec<String> = variants
        .variants()
        .iter()
        .map(|v| v.tag_name().to_string())
        .collect();
    tags.sort();
    tags
}

/// Progress of a [`StructAccess`] through one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ReadingAttributes,
    ReadingContent,
    ReportingMissing,
    Done,
}

/// MapAccess over the attributes and children of one structure element.
struct StructAccess<'a, R: BufRead> {
    de: &'a mut XmlDeserializer<R>,
    descriptor: Arc<StructureDescriptor>,
    context: FrameContext,
    names: NameMap,
    attributes: std::vec::IntoIter<XmlAttribute>,
    phase: Phase,
    seen: Vec<bool>,
    /// Fields settled after the end tag: absent collections, reported as
    /// empty, and an empty text value child.
    missing: VecDeque<(usize, Source)>,
    pending: Option<(usize, Source)>,
}

impl<'a, R: BufRead> StructAccess<'a, R> {
    fn new(
        de: &'a mut XmlDeserializer<R>,
        start: StartElement,
        descriptor: Arc<StructureDescriptor>,
    ) -> Self {
        trace!(
            structure = descriptor.type_name(),
            element = %start.name,
            "reading structure"
        );
        let context = FrameContext::capture(de.reader.scopes());
        Self {
            de,
            context,
            names: NameMap::new(),
            attributes: start.attributes.into_iter(),
            phase: Phase::ReadingAttributes,
            seen: vec![false; descriptor.len()],
            missing: VecDeque::new(),
            pending: None,
            descriptor,
        }
    }

    fn lookup(&mut self, name: &QualifiedName) -> Option<usize> {
        let normalized = name.normalize(&self.context);
        self.names
            .index_of(&self.descriptor, &self.context, &normalized)
    }

    fn unknown(&self, name: &QualifiedName, event: EventType) -> Result<()> {
        self.de
            .unknown_content(name, event, || self.descriptor.candidate_names())
    }

    /// Text goes to the value child. Whitespace only counts when the value
    /// child is explicitly text.
    fn text_target(&self, whitespace: bool) -> Option<usize> {
        let index = self.descriptor.value_child()?;
        if whitespace {
            let field = self.descriptor.field(index)?;
            (field.kind() == OutputKind::Text).then_some(index)
        } else {
            Some(index)
        }
    }

    /// A required text value child of an element that closed without text
    /// holds the empty string.
    fn is_empty_text(&self, field: &FieldDescriptor) -> bool {
        field.kind() == OutputKind::Text
            && !field.is_optional()
            && self.descriptor.value_child() == Some(field.index())
    }

    /// Checks the fields that never appeared once the element has closed.
    fn settle_missing(&mut self) -> Result<()> {
        let mut required = Vec::new();
        for (field, seen) in self.descriptor.fields().iter().zip(&self.seen) {
            if *seen {
                continue;
            }
            if field.value_shape().is_collection() {
                self.missing.push_back((field.index(), Source::Missing));
            } else if self.is_empty_text(field) {
                self.missing
                    .push_back((field.index(), Source::Text(String::new())));
            } else if !field.is_optional() {
                required.push(field.declared_name().to_string());
            }
        }
        if required.is_empty() {
            Ok(())
        } else {
            Err(SerdeError::MissingFields {
                structure: self.descriptor.type_name().to_string(),
                fields: required,
            })
        }
    }
}

impl<'de, 'a, R: BufRead> MapAccess<'de> for StructAccess<'a, R> {
    type Error = SerdeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let (index, source) = loop {
            match self.phase {
                Phase::ReadingAttributes => {
                    let Some(attribute) = self.attributes.next() else {
                        self.phase = Phase::ReadingContent;
                        continue;
                    };
                    if attribute.name.is_namespace_declaration() {
                        continue;
                    }
                    match self.lookup(&attribute.name) {
                        Some(index) => break (index, Source::Attribute(attribute.value)),
                        None => self.unknown(&attribute.name, EventType::Attribute)?,
                    }
                }
                Phase::ReadingContent => match self.de.reader.next_event()? {
                    XmlEvent::StartElement(start) => match self.lookup(&start.name) {
                        Some(index) => break (index, Source::Element(start)),
                        None => {
                            self.unknown(&start.name, EventType::StartElement)?;
                            self.de.reader.skip_element()?;
                        }
                    },
                    XmlEvent::Text(text) => match self.text_target(false) {
                        Some(index) => break (index, Source::Text(text)),
                        None if self.de.allow_mixed_text => {
                            trace!(structure = self.descriptor.type_name(), "skipping mixed text");
                        }
                        None => {
                            return Err(SerdeError::Malformed(format!(
                                "{} has no field for text {:?}",
                                self.descriptor.type_name(),
                                text
                            )));
                        }
                    },
                    XmlEvent::Whitespace(text) => {
                        if let Some(index) = self.text_target(true) {
                            break (index, Source::Text(text));
                        }
                    }
                    XmlEvent::Comment(_) => {}
                    XmlEvent::EndElement(_) => {
                        self.phase = Phase::ReportingMissing;
                        self.settle_missing()?;
                    }
                    XmlEvent::EndDocument => return Err(SerdeError::UnexpectedEof),
                },
                Phase::ReportingMissing => match self.missing.pop_front() {
                    Some(missing) => break missing,
                    None => self.phase = Phase::Done,
                },
                Phase::Done => return Ok(None),
            }
        };

        if let Some(seen) = self.seen.get_mut(index) {
            *seen = true;
        }
        let descriptor = Arc::clone(&self.descriptor);
        let field = descriptor
            .field(index)
            .ok_or_else(|| SerdeError::Malformed(format!("no field at index {}", index)))?;
        self.pending = Some((index, source));
        let key: StringDeserializer<SerdeError> = field.declared_name().to_string().into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let (index, source) = self
            .pending
            .take()
            .ok_or_else(|| SerdeError::Malformed("value requested before key".to_string()))?;
        let slot = self
            .descriptor
            .field(index)
            .map(ReadSlot::field)
            .ok_or_else(|| SerdeError::Malformed(format!("no field at index {}", index)))?;
        seed.deserialize(ValueDeserializer::new(&mut *self.de, source, slot))
    }
}

/// How repeated elements are found.
#[derive(Debug)]
enum ItemsMode {
    /// Children of a wrapper element, up to its end tag.
    Wrapped { done: bool },
    /// Consecutive siblings with the item name, starting with one already
    /// read.
    Siblings { first: Option<StartElement> },
}

/// Cursor over the items of a list or the entries of a map.
#[derive(Debug)]
struct Items {
    mode: ItemsMode,
    item: ReadSlot,
    context: FrameContext,
}

impl Items {
    fn next_start<R: BufRead>(&mut self, de: &mut XmlDeserializer<R>) -> Result<Option<StartElement>> {
        match &mut self.mode {
            ItemsMode::Siblings { first } => {
                if let Some(start) = first.take() {
                    return Ok(Some(start));
                }
                de.reader.skip_ignorable()?;
                let accepted = match de.reader.peek_event()? {
                    XmlEvent::StartElement(start) => accepts(&self.item, &self.context, &start.name),
                    _ => false,
                };
                if !accepted {
                    return Ok(None);
                }
                match de.reader.next_event()? {
                    XmlEvent::StartElement(start) => Ok(Some(start)),
                    _ => Ok(None),
                }
            }
            ItemsMode::Wrapped { done } => {
                if *done {
                    return Ok(None);
                }
                loop {
                    match de.reader.next_event()? {
                        XmlEvent::StartElement(start)
                            if accepts(&self.item, &self.context, &start.name) =>
                        {
                            return Ok(Some(start));
                        }
                        XmlEvent::StartElement(start) => {
                            de.unknown_content(&start.name, EventType::StartElement, || {
                                vec![self.item.name.to_string()]
                            })?;
                            de.reader.skip_element()?;
                        }
                        XmlEvent::EndElement(_) => {
                            *done = true;
                            return Ok(None);
                        }
                        XmlEvent::Text(text) => {
                            return Err(SerdeError::Malformed(format!(
                                "unexpected text {:?} among <{}> items",
                                text,
                                self.item.name.to_cname()
                            )));
                        }
                        XmlEvent::Whitespace(_) | XmlEvent::Comment(_) => {}
                        XmlEvent::EndDocument => return Err(SerdeError::UnexpectedEof),
                    }
                }
            }
        }
    }

    /// Consumes items a visitor left unread, and the wrapper's end tag.
    fn finish<R: BufRead>(&mut self, de: &mut XmlDeserializer<R>) -> Result<()> {
        while self.next_start(de)?.is_some() {
            de.reader.skip_element()?;
        }
        Ok(())
    }
}

struct SeqItems<'a, R: BufRead> {
    de: &'a mut XmlDeserializer<R>,
    items: Items,
}

impl<'de, 'a, R: BufRead> SeqAccess<'de> for SeqItems<'a, R> {
    type Error = SerdeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.items.next_start(self.de)? {
            Some(start) => seed
                .deserialize(ValueDeserializer::new(
                    &mut *self.de,
                    Source::Element(start),
                    self.items.item.clone(),
                ))
                .map(Some),
            None => Ok(None),
        }
    }
}

/// MapAccess over entry elements, each carrying a `key` attribute.
struct MapEntries<'a, R: BufRead> {
    de: &'a mut XmlDeserializer<R>,
    items: Items,
    key: ReadSlot,
    value: ReadSlot,
    pending: Option<StartElement>,
}

impl<R: BufRead> MapEntries<'_, R> {
    /// An attribute of the entry matching `name` under the frame's namespace
    /// rules, so prefixed entries carry prefixed keys.
    fn attribute<'e>(&self, entry: &'e StartElement, name: &QualifiedName) -> Option<&'e str> {
        let wanted = name.normalize(&self.items.context);
        entry
            .attributes
            .iter()
            .filter(|a| !a.name.is_namespace_declaration())
            .find(|a| a.name.normalize(&self.items.context) == wanted)
            .map(|a| a.value.as_str())
    }
}

impl<'de, 'a, R: BufRead> MapAccess<'de> for MapEntries<'a, R> {
    type Error = SerdeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(entry) = self.items.next_start(self.de)? else {
            return Ok(None);
        };
        let key = self
            .attribute(&entry, &self.key.name)
            .ok_or_else(|| SerdeError::MissingFields {
                structure: entry.name.to_string(),
                fields: vec![MAP_KEY.to_string()],
            })?
            .to_string();
        self.pending = Some(entry);
        seed.deserialize(ValueDeserializer::new(
            &mut *self.de,
            Source::Attribute(key),
            self.key.clone(),
        ))
        .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let entry = self
            .pending
            .take()
            .ok_or_else(|| SerdeError::Malformed("value requested before key".to_string()))?;

        if let Some(value) = self.attribute(&entry, &self.value.name) {
            let value = seed.deserialize(ValueDeserializer::new(
                &mut *self.de,
                Source::Attribute(value.to_string()),
                self.value.clone(),
            ))?;
            self.de.reader.skip_element()?;
            return Ok(value);
        }

        match self.de.reader.next_tag()? {
            XmlEvent::StartElement(child)
                if child.name.normalize(&self.items.context)
                    == self.value.name.normalize(&self.items.context) =>
            {
                let value = seed.deserialize(ValueDeserializer::new(
                    &mut *self.de,
                    Source::Element(child),
                    self.value.clone(),
                ))?;
                self.de.reader.skip_element()?;
                Ok(value)
            }
            XmlEvent::StartElement(child) => Err(SerdeError::UnknownName {
                name: child.name.to_string(),
                candidates: vec![self.value.name.to_string()],
            }),
            _ => seed.deserialize(ValueDeserializer::new(
                &mut *self.de,
                Source::Missing,
                self.value.clone(),
            )),
        }
    }
}

/// An enum value carried by an element.
struct ElementVariant<'a, R: BufRead> {
    de: &'a mut XmlDeserializer<R>,
    slot: ReadSlot,
    variant: String,
    payload: Source,
    /// The payload sits inside a field element whose end tag is still open.
    close_wrapper: bool,
}

impl<'a, R: BufRead> ElementVariant<'a, R> {
    fn close(de: &mut XmlDeserializer<R>, close_wrapper: bool) -> Result<()> {
        if close_wrapper {
            de.reader.require_end()?;
        }
        Ok(())
    }
}

impl<'de, 'a, R: BufRead> de::EnumAccess<'de> for ElementVariant<'a, R> {
    type Error = SerdeError;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
    where
        V: DeserializeSeed<'de>,
    {
        let name: StringDeserializer<SerdeError> = self.variant.clone().into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self))
    }
}

impl<'de, 'a, R: BufRead> de::VariantAccess<'de> for ElementVariant<'a, R> {
    type Error = SerdeError;

    fn unit_variant(self) -> Result<()> {
        if let Source::Element(_) = self.payload {
            self.de.reader.skip_element()?;
        }
        Self::close(self.de, self.close_wrapper)
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        let value = seed.deserialize(ValueDeserializer::new(
            &mut *self.de,
            self.payload,
            self.slot,
        ))?;
        Self::close(self.de, self.close_wrapper)?;
        Ok(value)
    }

    fn tuple_variant<V>(self, _len: usize, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(SerdeError::Malformed(format!(
            "tuple variant {} has no XML representation",
            self.variant
        )))
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = ValueDeserializer::new(&mut *self.de, self.payload, self.slot)
            .read_structure(&self.variant, fields, visitor)?;
        Self::close(self.de, self.close_wrapper)?;
        Ok(value)
    }
}

/// An absent collection.
struct EmptyAccess;

impl<'de> SeqAccess<'de> for EmptyAccess {
    type Error = SerdeError;

    fn next_element_seed<T>(&mut self, _seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        Ok(None)
    }
}

impl<'de> MapAccess<'de> for EmptyAccess {
    type Error = SerdeError;

    fn next_key_seed<K>(&mut self, _seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, _seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        Err(SerdeError::Malformed("empty map has no values".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Inner {
        a: u32,
        b: u32,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Outer {
        inner: Inner,
    }

    fn outer() -> Arc<StructureDescriptor> {
        Arc::new(
            StructureDescriptor::builder("Outer")
                .tag(QualifiedName::local("outer"))
                .field(FieldDescriptor::new("inner"))
                .build(),
        )
    }

    #[test]
    fn test_accepts_variant_tags() {
        let shapes = PolymorphicDescriptor::new()
            .transparent()
            .variant(VariantDescriptor::new("Circle").tag(QualifiedName::local("circle")));
        let item = ReadSlot::item(
            QualifiedName::local("shapes"),
            FieldShape::Polymorphic(Arc::new(shapes)),
        );
        let context = FrameContext::default();
        assert!(accepts(&item, &context, &QualifiedName::local("circle")));
        assert!(!accepts(&item, &context, &QualifiedName::local("shapes")));
    }

    #[test]
    fn test_undescribed_structure_defers_to_serde() {
        let xml: &[u8] = br#"<outer><inner a="1" b="2"/></outer>"#;
        let mut de = XmlDeserializer::new(xml, &XmlConfig::default());
        let value: Outer = de.deserialize(outer()).unwrap();
        de.end().unwrap();
        assert_eq!(value, Outer { inner: Inner { a: 1, b: 2 } });

        let xml: &[u8] = br#"<outer><inner a="1"/></outer>"#;
        let mut de = XmlDeserializer::new(xml, &XmlConfig::default());
        match de.deserialize::<Outer>(outer()) {
            Err(SerdeError::MissingFields { fields, .. }) => assert_eq!(fields, vec!["b"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_end_rejects_second_root() {
        let xml: &[u8] = br#"<outer><inner a="1" b="2"/></outer><outer/>"#;
        let mut de = XmlDeserializer::new(xml, &XmlConfig::default());
        let _: Outer = de.deserialize(outer()).unwrap();
        assert!(de.end().is_err());
    }
}
