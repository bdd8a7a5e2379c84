//! # Weft XML Serialization
//!
//! Descriptor-driven XML codec on top of serde.
//!
//! ## Features
//!
//! - **Descriptor driven**: each structured type describes its XML layout once through
//!   [`XmlDescribe`](weft_serde_support::XmlDescribe); descriptors are built on first
//!   use and cached for the life of the process.
//! - **Streaming**: custom `serde::Serializer` and `serde::Deserializer`
//!   implementations write and read quick-xml events directly, with no intermediate
//!   tree.
//! - **Attribute ordering**: fields may be declared in any order; attributes are
//!   always emitted before element content.
//! - **Namespaces**: qualified names throughout, with automatic prefix declaration on
//!   write and prefix-insensitive matching on read.
//!
//! ## Examples
//!
//! ```ignore
//! use weft_serde::{XmlCodec, XmlConfig};
//!
//! let codec = XmlCodec::new(XmlConfig::default().with_indent(2));
//! let xml = codec.to_string(&item)?;
//! let item: Item = codec.from_str(&xml)?;
//! ```

pub mod config;
pub mod error;
pub mod xml;

// Re-export common types and functions
pub use config::{UnknownContentHandler, UnknownContentPolicy, XmlCodec, XmlConfig};
pub use error::{Result, SerdeError};

// Re-export XML functions at top level for convenience
pub use xml::{
    from_xml_reader, from_xml_slice, from_xml_str, to_xml_string, to_xml_vec, to_xml_writer,
};
