//! Codec configuration and the session factory.

use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use weft_serde_support::{QualifiedName, StructureDescriptor, XmlDescribe, descriptor_of};

use crate::error::Result;
use crate::xml::de::XmlDeserializer;
use crate::xml::reader::EventType;
use crate::xml::ser::XmlSerializer;

/// Callback consulted for attributes and elements that match no field.
///
/// Returning `Ok` skips the offending content; an error aborts decoding.
pub type UnknownContentHandler = Arc<dyn Fn(&QualifiedName, EventType) -> Result<()> + Send + Sync>;

/// What the decoder does with names it cannot map to a field.
#[derive(Clone, Default)]
pub enum UnknownContentPolicy {
    /// Fail with [`SerdeError::UnknownName`](crate::SerdeError::UnknownName).
    #[default]
    Fail,
    /// Skip the attribute, or the element and everything inside it.
    Ignore,
    Custom(UnknownContentHandler),
}

impl fmt::Debug for UnknownContentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownContentPolicy::Fail => f.write_str("Fail"),
            UnknownContentPolicy::Ignore => f.write_str("Ignore"),
            UnknownContentPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Settings shared by every encode and decode run of an [`XmlCodec`].
#[derive(Debug, Clone)]
pub struct XmlConfig {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` before the root element.
    pub xml_declaration: bool,
    /// Pretty-print with this many spaces per level.
    pub indent: Option<usize>,
    /// Declare namespaces that tags and prefixed attributes need but that are
    /// not in scope yet.
    pub repair_namespaces: bool,
    pub unknown_content: UnknownContentPolicy,
    /// Skip text inside structures that have no field to receive it, instead
    /// of failing.
    pub allow_mixed_text: bool,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            xml_declaration: false,
            indent: None,
            repair_namespaces: true,
            unknown_content: UnknownContentPolicy::Fail,
            allow_mixed_text: false,
        }
    }
}

impl XmlConfig {
    pub fn with_declaration(mut self, enabled: bool) -> Self {
        self.xml_declaration = enabled;
        self
    }

    pub fn with_indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }

    pub fn with_repair_namespaces(mut self, enabled: bool) -> Self {
        self.repair_namespaces = enabled;
        self
    }

    pub fn with_unknown_content(mut self, policy: UnknownContentPolicy) -> Self {
        self.unknown_content = policy;
        self
    }

    pub fn with_mixed_text(mut self, allowed: bool) -> Self {
        self.allow_mixed_text = allowed;
        self
    }
}

/// Entry point holding one configuration.
///
/// Every call is an independent session; nothing but the immutable
/// descriptor cache is shared between calls.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use weft_serde::{XmlCodec, XmlConfig};
/// use weft_serde_support::{FieldDescriptor, QualifiedName, StructureDescriptor, XmlDescribe};
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Item {
///     id: u32,
///     name: String,
/// }
///
/// impl XmlDescribe for Item {
///     fn describe() -> StructureDescriptor {
///         StructureDescriptor::builder("Item")
///             .tag(QualifiedName::local("item"))
///             .field(FieldDescriptor::new("id").primitive())
///             .field(FieldDescriptor::new("name").primitive().element())
///             .build()
///     }
/// }
///
/// let codec = XmlCodec::new(XmlConfig::default());
/// let item = Item { id: 7, name: "ok".to_string() };
/// let xml = codec.to_string(&item)?;
/// assert_eq!(xml, r#"<item id="7"><name>ok</name></item>"#);
/// assert_eq!(codec.from_str::<Item>(&xml)?, item);
/// # Ok::<(), weft_serde::SerdeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct XmlCodec {
    config: XmlConfig,
}

impl XmlCodec {
    pub fn new(config: XmlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &XmlConfig {
        &self.config
    }

    pub fn to_string<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + XmlDescribe + 'static,
    {
        self.to_string_as(value, descriptor_of::<T>())
    }

    /// Encodes `value` with an explicitly supplied root descriptor.
    pub fn to_string_as<T>(&self, value: &T, descriptor: Arc<StructureDescriptor>) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let buffer = self.to_writer_as(value, descriptor, Vec::new())?;
        String::from_utf8(buffer).map_err(|e| crate::SerdeError::Custom(e.to_string()))
    }

    pub fn to_vec<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + XmlDescribe + 'static,
    {
        self.to_writer_as(value, descriptor_of::<T>(), Vec::new())
    }

    pub fn to_writer<T, W>(&self, value: &T, writer: W) -> Result<W>
    where
        T: Serialize + XmlDescribe + 'static,
        W: Write,
    {
        self.to_writer_as(value, descriptor_of::<T>(), writer)
    }

    pub fn to_writer_as<T, W>(
        &self,
        value: &T,
        descriptor: Arc<StructureDescriptor>,
        writer: W,
    ) -> Result<W>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        let mut serializer = XmlSerializer::new(writer, &self.config)?;
        serializer.serialize(value, descriptor)?;
        serializer.finish()
    }

    pub fn from_str<T>(&self, xml: &str) -> Result<T>
    where
        T: DeserializeOwned + XmlDescribe + 'static,
    {
        self.from_reader(xml.as_bytes())
    }

    /// Decodes a root element described by an explicitly supplied descriptor.
    pub fn from_str_as<T>(&self, xml: &str, descriptor: Arc<StructureDescriptor>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.from_reader_as(xml.as_bytes(), descriptor)
    }

    pub fn from_slice<T>(&self, xml: &[u8]) -> Result<T>
    where
        T: DeserializeOwned + XmlDescribe + 'static,
    {
        self.from_reader(xml)
    }

    pub fn from_reader<R, T>(&self, reader: R) -> Result<T>
    where
        R: BufRead,
        T: DeserializeOwned + XmlDescribe + 'static,
    {
        self.from_reader_as(reader, descriptor_of::<T>())
    }

    pub fn from_reader_as<R, T>(&self, reader: R, descriptor: Arc<StructureDescriptor>) -> Result<T>
    where
        R: BufRead,
        T: DeserializeOwned,
    {
        let mut deserializer = XmlDeserializer::new(reader, &self.config);
        let value = deserializer.deserialize(descriptor)?;
        deserializer.end()?;
        Ok(value)
    }
}
