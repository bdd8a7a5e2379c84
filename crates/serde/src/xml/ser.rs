//! XML serialization implementation using custom serde::Serializer.
//!
//! Every value is written into a [`Slot`]: the name, output kind and shape of
//! the field (or collection item, or root) it occupies. Structures open one
//! element and route each field through the slot its descriptor declares;
//! fields that would put an attribute after content are sent through a
//! reordering buffer.

use std::io::Write;
use std::sync::Arc;

use serde::ser::{self, Impossible, Serialize};
use tracing::debug;
use weft_serde_support::policy::{ValueForm, resolve_on_write};
use weft_serde_support::{
    FieldDescriptor, FieldShape, OutputKind, PolymorphicDescriptor, QualifiedName,
    StructureDescriptor, VariantDescriptor, XmlDescribe,
};

use super::buffer::BufferedWriter;
use super::utils;
use super::writer::{InvertedSink, StreamWriter, XmlSink};
use crate::config::{XmlCodec, XmlConfig};
use crate::error::{Result, SerdeError};

/// Serialize a value to an XML string.
///
/// # Examples
///
/// ```ignore
/// use weft_serde::to_xml_string;
///
/// let xml = to_xml_string(&item)?;
/// ```
pub fn to_xml_string<T>(value: &T) -> Result<String>
where
    T: Serialize + XmlDescribe + 'static,
{
    XmlCodec::default().to_string(value)
}

/// Serialize a value to an XML byte vector.
pub fn to_xml_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + XmlDescribe + 'static,
{
    XmlCodec::default().to_vec(value)
}

/// Serialize a value to an XML writer.
pub fn to_xml_writer<T, W>(value: &T, writer: W) -> Result<()>
where
    T: Serialize + XmlDescribe + 'static,
    W: Write,
{
    XmlCodec::default().to_writer(value, writer)?;
    Ok(())
}

/// Encodes root values onto one output stream.
pub struct XmlSerializer<W: Write> {
    writer: StreamWriter<W>,
}

impl<W: Write> XmlSerializer<W> {
    /// Creates a new XML serializer. Writes the XML declaration if the
    /// configuration asks for it.
    pub fn new(writer: W, config: &XmlConfig) -> Result<Self> {
        Ok(Self {
            writer: StreamWriter::new(writer, config)?,
        })
    }

    /// Encodes `value` as the root element described by `descriptor`.
    pub fn serialize<T>(&mut self, value: &T, descriptor: Arc<StructureDescriptor>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(ValueSerializer::new(&mut self.writer, Slot::root(descriptor)))
    }

    /// Finishes serialization and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer.finish()
    }
}

/// Where a value goes.
#[derive(Debug, Clone)]
struct Slot {
    name: QualifiedName,
    kind: OutputKind,
    shape: FieldShape,
    child_name: Option<QualifiedName>,
    descriptor: Option<Arc<StructureDescriptor>>,
    root: bool,
}

impl Slot {
    fn root(descriptor: Arc<StructureDescriptor>) -> Self {
        Self {
            name: descriptor.tag().clone(),
            kind: OutputKind::Element,
            shape: FieldShape::Unknown,
            child_name: descriptor.child_name().cloned(),
            descriptor: Some(descriptor),
            root: true,
        }
    }

    fn field(field: &FieldDescriptor) -> Self {
        Self {
            name: field.resolved_name().clone(),
            kind: field.kind(),
            shape: field.value_shape().clone(),
            child_name: field.child_name_override().cloned(),
            descriptor: field.value_shape().descriptor(),
            root: false,
        }
    }

    /// A field of a structure that has no descriptor.
    fn dynamic(name: QualifiedName) -> Self {
        Self {
            name,
            kind: OutputKind::Unknown,
            shape: FieldShape::Unknown,
            child_name: None,
            descriptor: None,
            root: false,
        }
    }

    /// A collection item or polymorphic payload: always its own element.
    fn item(name: QualifiedName, shape: FieldShape) -> Self {
        Self {
            name,
            kind: OutputKind::Element,
            descriptor: shape.descriptor(),
            shape,
            child_name: None,
            root: false,
        }
    }

    /// The slot seen by the content of a newtype struct.
    ///
    /// Newtypes are transparent. At the root, a descriptor with a single
    /// collection field describes the wrapped collection.
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

    fn variant(&self, variant: &'static str) -> Result<VariantPlan> {
        if self.root {
            return Err(SerdeError::UnsupportedTopLevel(format!(
                "enum variant {}",
                variant
            )));
        }
        resolve_on_write(self.kind, ValueForm::Nested)?;
        let polymorphic = self.polymorphic();
        let described = polymorphic
            .and_then(|p| p.by_name(variant))
            .cloned()
            .unwrap_or_else(|| VariantDescriptor::new(variant).tag(self.name.sibling(variant)));
        Ok(VariantPlan {
            transparent: polymorphic.is_some_and(PolymorphicDescriptor::is_transparent),
            discriminator: described.discriminator_value().to_string(),
            payload: Slot::item(described.tag_name().clone(), described.payload_shape().clone()),
        })
    }

    fn unit_variant_value(&self, variant: &'static str) -> String {
        self.polymorphic()
            .and_then(|p| p.by_name(variant))
            .map(|v| v.discriminator_value().to_string())
            .unwrap_or_else(|| variant.to_string())
    }
}

struct VariantPlan {
    transparent: bool,
    discriminator: String,
    payload: Slot,
}

fn type_attribute() -> QualifiedName {
    QualifiedName::local(utils::TYPE_ATTRIBUTE)
}

/// Serializes one value into its slot.
struct ValueSerializer<'a> {
    sink: &'a mut dyn XmlSink,
    slot: Slot,
}

impl<'a> ValueSerializer<'a> {
    fn new(sink: &'a mut dyn XmlSink, slot: Slot) -> Self {
        Self { sink, slot }
    }

    fn write_scalar(self, value: &str) -> Result<()> {
        if self.slot.root {
            return Err(SerdeError::UnsupportedTopLevel(format!(
                "primitive value {:?}",
                value
            )));
        }
        match resolve_on_write(self.slot.kind, ValueForm::Scalar)? {
            OutputKind::Attribute => self.sink.write_attribute(&self.slot.name, value),
            OutputKind::Text => self.sink.text(value),
            OutputKind::Element | OutputKind::Unknown => {
                self.sink.smart_start_tag(&self.slot.name)?;
                if !value.is_empty() {
                    self.sink.text(value)?;
                }
                self.sink.end_tag(&self.slot.name)
            }
        }
    }

    fn write_variant<T>(self, variant: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let plan = self.slot.variant(variant)?;
        if plan.transparent {
            return value.serialize(ValueSerializer::new(self.sink, plan.payload));
        }
        self.sink.smart_start_tag(&self.slot.name)?;
        self.sink
            .write_attribute(&type_attribute(), &plan.discriminator)?;
        value.serialize(ValueSerializer::new(&mut *self.sink, plan.payload))?;
        self.sink.end_tag(&self.slot.name)
    }
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = ();
    type Error = SerdeError;

    type SerializeSeq = SeqEncoder<'a>;
    type SerializeTuple = Impossible<(), SerdeError>;
    type SerializeTupleStruct = Impossible<(), SerdeError>;
    type SerializeTupleVariant = Impossible<(), SerdeError>;
    type SerializeMap = MapEncoder<'a>;
    type SerializeStruct = StructEncoder<'a>;
    type SerializeStructVariant = StructEncoder<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write_scalar(utils::bool_to_string(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.write_scalar(&v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.write_scalar(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_scalar(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(SerdeError::Malformed(
            "byte arrays have no XML representation".to_string(),
        ))
    }

    fn serialize_none(self) -> Result<()> {
        // Absent values produce no output.
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        resolve_on_write(self.slot.kind, ValueForm::Nested)?;
        self.sink.smart_start_tag(&self.slot.name)?;
        self.sink.end_tag(&self.slot.name)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        let value = self.slot.unit_variant_value(variant);
        self.write_scalar(&value)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let slot = self.slot.newtype_inner();
        value.serialize(ValueSerializer::new(self.sink, slot))
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.write_variant(variant, value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        SeqEncoder::begin(self.sink, self.slot)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(SerdeError::Malformed(
            "tuples have no XML representation".to_string(),
        ))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(SerdeError::Malformed(format!(
            "tuple struct {} has no XML representation",
            name
        )))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(SerdeError::Malformed(format!(
            "tuple variant {}::{} has no XML representation",
            name, variant
        )))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        MapEncoder::begin(self.sink, self.slot)
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        StructEncoder::begin(self.sink, self.slot, name, len, None)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        let plan = self.slot.variant(variant)?;
        let wrapper = if plan.transparent {
            None
        } else {
            self.sink.smart_start_tag(&self.slot.name)?;
            self.sink
                .write_attribute(&type_attribute(), &plan.discriminator)?;
            Some(self.slot.name.clone())
        };
        StructEncoder::begin(self.sink, plan.payload, name, len, wrapper)
    }
}

/// Field layout of the structure being written.
enum Layout {
    Described(Arc<StructureDescriptor>),
    /// No descriptor: every field is settled when it is written.
    Dynamic,
}

/// Writes the fields of one structure in the order serde hands them over.
///
/// Content is held back in a buffer while any field that may still produce
/// an attribute has not been written. When serde's order is the descriptor's
/// declaration order, that buffered span ends exactly at the descriptor's
/// last inverted index.
pub struct StructEncoder<'a> {
    sink: &'a mut dyn XmlSink,
    tag: QualifiedName,
    layout: Layout,
    next_index: usize,
    /// Per field index: not written yet and may still become an attribute.
    open_attributes: Vec<bool>,
    buffer: Option<BufferedWriter>,
    /// Extra element to close after the structure: the field wrapper of a
    /// non-transparent struct variant.
    wrapper: Option<QualifiedName>,
}

impl<'a> StructEncoder<'a> {
    fn begin(
        sink: &'a mut dyn XmlSink,
        slot: Slot,
        name: &'static str,
        len: usize,
        wrapper: Option<QualifiedName>,
    ) -> Result<Self> {
        resolve_on_write(slot.kind, ValueForm::Nested)?;
        let (layout, open_attributes) = match slot.descriptor {
            Some(descriptor) => {
                let open = descriptor
                    .fields()
                    .iter()
                    .map(|field| {
                        matches!(field.kind(), OutputKind::Attribute | OutputKind::Unknown)
                    })
                    .collect();
                (Layout::Described(descriptor), open)
            }
            None => {
                debug!(structure = name, fields = len, "encoding structure without descriptor");
                (Layout::Dynamic, vec![true; len])
            }
        };
        sink.smart_start_tag(&slot.name)?;
        Ok(Self {
            sink,
            tag: slot.name,
            layout,
            next_index: 0,
            open_attributes,
            buffer: None,
            wrapper,
        })
    }

    fn attributes_pending_besides(&self, index: usize) -> bool {
        self.open_attributes
            .iter()
            .enumerate()
            .any(|(i, open)| *open && i != index)
    }

    /// Marks `index` as written and flushes once no attribute can follow.
    fn settle(&mut self, index: usize) -> Result<()> {
        if let Some(open) = self.open_attributes.get_mut(index) {
            *open = false;
        }
        if !self.open_attributes.contains(&true) {
            self.flush()?;
        }
        Ok(())
    }

    fn field_slot(&mut self, key: &'static str) -> Result<(usize, Slot)> {
        let slot = match &self.layout {
            Layout::Described(descriptor) => {
                let field = descriptor
                    .index_of_declared(key)
                    .and_then(|index| descriptor.field(index))
                    .ok_or_else(|| {
                        SerdeError::Malformed(format!(
                            "{} has no field named {}",
                            descriptor.type_name(),
                            key
                        ))
                    })?;
                (field.index(), Slot::field(field))
            }
            Layout::Dynamic => (self.next_index, Slot::dynamic(self.tag.sibling(key))),
        };
        self.next_index += 1;
        Ok(slot)
    }

    fn write_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let (index, slot) = self.field_slot(key)?;

        let reorder = self.buffer.is_some()
            || (slot.kind != OutputKind::Attribute && self.attributes_pending_besides(index));
        if reorder {
            if self.buffer.is_none() {
                debug!(structure = %self.tag, field = key, "opening reordering buffer");
            }
            let buffer = self.buffer.get_or_insert_with(BufferedWriter::new);
            let mut inverted = InvertedSink::new(&mut *self.sink, buffer);
            value.serialize(ValueSerializer::new(&mut inverted, slot))?;
        } else {
            value.serialize(ValueSerializer::new(&mut *self.sink, slot))?;
        }
        self.settle(index)
    }

    fn skip(&mut self, key: &'static str) -> Result<()> {
        let (index, _) = self.field_slot(key)?;
        self.settle(index)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(mut buffer) = self.buffer.take() {
            debug!(structure = %self.tag, events = buffer.len(), "flushing reordering buffer");
            buffer.flush_to(&mut *self.sink)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.flush()?;
        self.sink.end_tag(&self.tag)?;
        if let Some(wrapper) = &self.wrapper {
            self.sink.end_tag(wrapper)?;
        }
        Ok(())
    }
}

impl ser::SerializeStruct for StructEncoder<'_> {
    type Ok = ();
    type Error = SerdeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.write_field(key, value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<()> {
        self.skip(key)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for StructEncoder<'_> {
    type Ok = ();
    type Error = SerdeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.write_field(key, value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<()> {
        self.skip(key)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Declares the namespace of a prefixed item name on the wrapper element if
/// it is not in scope there.
fn declare_item_namespace(sink: &mut dyn XmlSink, item: &QualifiedName) -> Result<()> {
    if item.prefix().is_empty() || item.namespace_uri().is_empty() {
        return Ok(());
    }
    if sink.namespace_uri(item.prefix()).as_deref() != Some(item.namespace_uri()) {
        sink.namespace_attr(item.prefix(), item.namespace_uri())?;
    }
    Ok(())
}

/// Opens the wrapper of a collection with a child name and returns the name
/// repeated items are written under.
fn begin_collection(
    sink: &mut dyn XmlSink,
    slot: &Slot,
) -> Result<(Option<QualifiedName>, QualifiedName)> {
    resolve_on_write(slot.kind, ValueForm::Nested)?;
    match &slot.child_name {
        Some(child) => {
            sink.smart_start_tag(&slot.name)?;
            declare_item_namespace(sink, child)?;
            Ok((Some(slot.name.clone()), child.clone()))
        }
        None if slot.root => Err(SerdeError::UnsupportedTopLevel(format!(
            "collection <{}> without a child name",
            slot.name.to_cname()
        ))),
        None => Ok((None, slot.name.clone())),
    }
}

/// Writes list items as repeated elements, with no size marker.
pub struct SeqEncoder<'a> {
    sink: &'a mut dyn XmlSink,
    wrapper: Option<QualifiedName>,
    item: Slot,
}

impl<'a> SeqEncoder<'a> {
    fn begin(sink: &'a mut dyn XmlSink, slot: Slot) -> Result<Self> {
        let (wrapper, item_name) = begin_collection(sink, &slot)?;
        Ok(Self {
            sink,
            wrapper,
            item: Slot::item(item_name, slot.shape.item_shape()),
        })
    }
}

impl ser::SerializeSeq for SeqEncoder<'_> {
    type Ok = ();
    type Error = SerdeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(ValueSerializer::new(&mut *self.sink, self.item.clone()))
    }

    fn end(self) -> Result<()> {
        if let Some(wrapper) = &self.wrapper {
            self.sink.end_tag(wrapper)?;
        }
        Ok(())
    }
}

/// Writes map entries as repeated elements carrying a `key` attribute and a
/// `value` attribute or child.
pub struct MapEncoder<'a> {
    sink: &'a mut dyn XmlSink,
    wrapper: Option<QualifiedName>,
    entry: Arc<StructureDescriptor>,
    key: Option<String>,
}

impl<'a> MapEncoder<'a> {
    fn begin(sink: &'a mut dyn XmlSink, slot: Slot) -> Result<Self> {
        let (wrapper, entry_name) = begin_collection(sink, &slot)?;
        Ok(Self {
            sink,
            wrapper,
            entry: Arc::new(StructureDescriptor::map_entry(
                &entry_name,
                slot.shape.item_shape(),
            )),
            key: None,
        })
    }
}

impl ser::SerializeMap for MapEncoder<'_> {
    type Ok = ();
    type Error = SerdeError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let mut capture = KeyCapture(None);
        key.serialize(&mut capture)?;
        self.key = capture.0;
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| SerdeError::Malformed("map value without a key".to_string()))?;
        let entry = Arc::clone(&self.entry);
        let [key_field, value_field] = entry.fields() else {
            return Err(SerdeError::Malformed(
                "map entries have exactly two fields".to_string(),
            ));
        };

        self.sink.smart_start_tag(entry.tag())?;
        self.sink.write_attribute(key_field.resolved_name(), &key)?;
        value.serialize(ValueSerializer::new(&mut *self.sink, Slot::field(value_field)))?;
        self.sink.end_tag(entry.tag())
    }

    fn end(self) -> Result<()> {
        if let Some(wrapper) = &self.wrapper {
            self.sink.end_tag(wrapper)?;
        }
        Ok(())
    }
}

/// Captures a primitive map key as a string.
struct KeyCapture(Option<String>);

impl KeyCapture {
    fn set(&mut self, value: impl ToString) -> Result<()> {
        self.0 = Some(value.to_string());
        Ok(())
    }
}

fn key_error() -> SerdeError {
    SerdeError::Malformed("map keys must be primitive values".to_string())
}

impl<'a> ser::Serializer for &'a mut KeyCapture {
    type Ok = ();
    type Error = SerdeError;
    type SerializeSeq = Impossible<(), SerdeError>;
    type SerializeTuple = Impossible<(), SerdeError>;
    type SerializeTupleStruct = Impossible<(), SerdeError>;
    type SerializeTupleVariant = Impossible<(), SerdeError>;
    type SerializeMap = Impossible<(), SerdeError>;
    type SerializeStruct = Impossible<(), SerdeError>;
    type SerializeStructVariant = Impossible<(), SerdeError>;

    fn serialize_str(self, v: &str) -> Result<()> {
        self.set(v)
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.set(utils::bool_to_string(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.set(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.set(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.set(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.set(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.set(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.set(v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.set(v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.set(v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.set(v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.set(v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.set(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(key_error())
    }

    fn serialize_none(self) -> Result<()> {
        Err(key_error())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Err(key_error())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Err(key_error())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.set(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(key_error())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_error())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_error())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(key_error())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_error())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_error())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_error())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::buffer::BufferedEvent;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Late {
        tag: String,
        id: u32,
    }

    fn late() -> Arc<StructureDescriptor> {
        Arc::new(
            StructureDescriptor::builder("Late")
                .tag(QualifiedName::local("item"))
                .field(FieldDescriptor::new("tag").primitive().element())
                .field(FieldDescriptor::new("id").primitive())
                .build(),
        )
    }

    #[test]
    fn test_reordering_inside_a_buffer() {
        // The outer buffer stands in for a parent that is itself reordering.
        let mut outer = BufferedWriter::new();
        let value = Late {
            tag: "x".to_string(),
            id: 7,
        };
        value
            .serialize(ValueSerializer::new(&mut outer, Slot::root(late())))
            .unwrap();

        let item = QualifiedName::local("item");
        let tag = QualifiedName::local("tag");
        assert_eq!(
            outer.events(),
            &[
                BufferedEvent::SmartStartTag(item.clone()),
                BufferedEvent::Attribute(QualifiedName::local("id"), "7".to_string()),
                BufferedEvent::SmartStartTag(tag.clone()),
                BufferedEvent::Text("x".to_string()),
                BufferedEvent::EndTag(tag),
                BufferedEvent::EndTag(item),
            ]
        );
    }

    #[test]
    fn test_top_level_primitive_is_rejected() {
        let mut sink = BufferedWriter::new();
        let err = 5u32
            .serialize(ValueSerializer::new(&mut sink, Slot::root(late())))
            .unwrap_err();
        assert!(matches!(err, SerdeError::UnsupportedTopLevel(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_key_capture() {
        let mut capture = KeyCapture(None);
        42u8.serialize(&mut capture).unwrap();
        assert_eq!(capture.0.as_deref(), Some("42"));
        assert!(vec![1].serialize(&mut KeyCapture(None)).is_err());
    }
}
