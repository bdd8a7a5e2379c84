//! XML encoding and decoding driven by structure descriptors.
//!
//! This module provides streaming XML support through custom `serde::Serializer` and
//! `serde::Deserializer` implementations. Values travel through serde; where each field
//! lands in the document (attribute, child element or element text) comes from the
//! [`StructureDescriptor`](weft_serde_support::StructureDescriptor) of its type.
//!
//! ## Architecture
//!
//! - **Serialization**: the serializer opens one element per structure and writes each
//!   field into the slot its descriptor resolves. A field that would put an attribute
//!   after element content starts a reordering buffer; attributes keep flowing to the
//!   open start tag while content is held back until the last such field is written.
//!
//! - **Deserialization**: a pull reader over quick-xml feeds a per-structure state
//!   machine that walks the attributes, then the child content, then reports every
//!   required field that never appeared in one error.
//!
//! ## Mapping
//!
//! | Value | XML |
//! |-------|-----|
//! | primitive field | `<item id="7"/>` |
//! | primitive field marked as element | `<item><name>ok</name></item>` |
//! | nested structure | `<item><owner name="a"/></item>` |
//! | list without child name | `<item><tag>a</tag><tag>b</tag></item>` |
//! | list with child name | `<item><tags><tag>a</tag><tag>b</tag></tags></item>` |
//! | map | `<item><count key="a" value="1"/><count key="b" value="2"/></item>` |
//! | polymorphic value | `<shape type="circle"><circle r="1"/></shape>` |
//! | transparent polymorphic value | `<circle r="1"/>` |
//!
//! Absent optional values produce no output, and lists carry no size marker: an empty
//! list without child name writes nothing at all.
//!
//! ## Namespaces
//!
//! Field names default to the namespace and prefix of the element that owns them.
//! With namespace repair enabled (the default), the writer declares any prefix a tag or
//! attribute needs on the element where it is first used. Names are compared by
//! namespace and local name; prefixes never matter when decoding.
//!
//! ## Examples
//!
//! ```ignore
//! use weft_serde::xml::{to_xml_string, from_xml_str};
//!
//! let xml = to_xml_string(&item)?;
//! let item: Item = from_xml_str(&xml)?;
//! ```

pub mod buffer;
pub mod de;
pub mod names;
pub mod reader;
pub mod ser;
mod utils;
pub mod writer;

// Re-export serialization functions
pub use ser::{XmlSerializer, to_xml_string, to_xml_vec, to_xml_writer};

// Re-export deserialization functions
pub use de::{XmlDeserializer, from_xml_reader, from_xml_slice, from_xml_str};
