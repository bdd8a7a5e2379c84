//! # Weft serialization support
//!
//! Data model shared by the weft XML codec and the types it encodes:
//!
//! - [`QualifiedName`]: namespace URI + local name + display prefix, with
//!   prefix-insensitive normalization against a [`NamespaceContext`].
//! - [`NamespaceScopes`]: a stack of prefix bindings that follows element nesting.
//! - [`StructureDescriptor`] / [`FieldDescriptor`]: the static, per-type field
//!   list that drives both encoding and decoding.
//! - [`policy`]: the rules that turn a field shape and an explicit hint into an
//!   [`OutputKind`].
//! - [`XmlDescribe`] and [`descriptor_of`]: the process-wide, type-keyed
//!   descriptor cache.
//!
//! ```
//! use weft_serde_support::{FieldDescriptor, QualifiedName, StructureDescriptor, XmlDescribe};
//!
//! struct Item;
//!
//! impl XmlDescribe for Item {
//!     fn describe() -> StructureDescriptor {
//!         StructureDescriptor::builder("Item")
//!             .tag(QualifiedName::local("item"))
//!             .field(FieldDescriptor::new("id").primitive())
//!             .field(FieldDescriptor::new("name").primitive().element())
//!             .build()
//!     }
//! }
//!
//! let descriptor = weft_serde_support::descriptor_of::<Item>();
//! assert_eq!(descriptor.len(), 2);
//! ```

pub mod descriptor;
pub mod name;
pub mod namespace;
pub mod policy;
pub mod registry;

pub use descriptor::{
    DescriptorRef, FieldDescriptor, FieldShape, KindHint, MAP_KEY, MAP_VALUE, OutputKind,
    PolymorphicDescriptor, StructureBuilder, StructureDescriptor, VariantDescriptor,
};
pub use name::QualifiedName;
pub use namespace::{NamespaceContext, NamespaceScopes};
pub use registry::{XmlDescribe, descriptor_of};
