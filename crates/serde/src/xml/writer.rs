//! Write targets for the encoder.
//!
//! [`XmlSink`] is the small set of operations the encoder needs. It is
//! implemented by the live [`StreamWriter`], by the
//! [`BufferedWriter`](super::buffer::BufferedWriter) that records events for
//! later replay, and by [`InvertedSink`], which splits one structure's output
//! between the two while attributes and content are being reordered.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use weft_serde_support::name::{XMLNS_ATTRIBUTE, XMLNS_ATTRIBUTE_NS_URI};
use weft_serde_support::{NamespaceContext, NamespaceScopes, QualifiedName};

use super::buffer::BufferedWriter;
use crate::config::XmlConfig;
use crate::error::{Result, SerdeError};

/// Operations the encoder performs on its output.
pub trait XmlSink {
    fn start_tag(&mut self, name: &QualifiedName) -> Result<()>;

    /// Like [`start_tag`](Self::start_tag), but also declares the tag's
    /// namespace when its prefix is not bound to it yet.
    fn smart_start_tag(&mut self, name: &QualifiedName) -> Result<()>;

    fn end_tag(&mut self, name: &QualifiedName) -> Result<()>;

    fn write_attribute(&mut self, name: &QualifiedName, value: &str) -> Result<()>;

    fn text(&mut self, text: &str) -> Result<()>;

    fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// The URI `prefix` is bound to at the current position.
    fn namespace_uri(&self, prefix: &str) -> Option<String>;
}

/// The live writer: quick-xml events on an `io::Write`.
///
/// A start tag stays pending until the first child, text or end tag arrives,
/// so attributes and namespace declarations can still be added to it and an
/// element without content is written self-closing.
pub struct StreamWriter<W: Write> {
    writer: Writer<W>,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
    scopes: NamespaceScopes,
    repair_namespaces: bool,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W, config: &XmlConfig) -> Result<Self> {
        let mut writer = match config.indent {
            Some(spaces) => Writer::new_with_indent(inner, b' ', spaces),
            None => Writer::new(inner),
        };
        if config.xml_declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        Ok(Self {
            writer,
            pending: None,
            open: Vec::new(),
            scopes: NamespaceScopes::new(),
            repair_namespaces: config.repair_namespaces,
        })
    }

    /// Returns the underlying writer. Fails if elements are still open.
    pub fn finish(mut self) -> Result<W> {
        if let Some(name) = self.open.last() {
            return Err(SerdeError::Malformed(format!(
                "element <{}> is still open at the end of the document",
                name
            )));
        }
        self.write_pending()?;
        Ok(self.writer.into_inner())
    }

    fn write_pending(&mut self) -> Result<()> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }

    fn ensure_declared(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let bound = self.scopes.namespace_uri(prefix);
        let satisfied = match bound {
            Some(current) => current == uri,
            None => uri.is_empty(),
        };
        // A non-empty prefix cannot be bound to the empty namespace.
        if satisfied || (uri.is_empty() && !prefix.is_empty()) {
            return Ok(());
        }
        self.namespace_attr(prefix, uri)
    }
}

impl<W: Write> XmlSink for StreamWriter<W> {
    fn start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.write_pending()?;
        let cname = name.to_cname();
        self.pending = Some(BytesStart::new(cname.clone()));
        self.open.push(cname);
        self.scopes.push_scope();
        Ok(())
    }

    fn smart_start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.start_tag(name)?;
        if self.repair_namespaces {
            self.ensure_declared(name.prefix(), name.namespace_uri())?;
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &QualifiedName) -> Result<()> {
        let cname = name.to_cname();
        match self.open.pop() {
            Some(open) if open == cname => {}
            Some(open) => {
                return Err(SerdeError::Malformed(format!(
                    "closing </{}> while <{}> is open",
                    cname, open
                )));
            }
            None => {
                return Err(SerdeError::Malformed(format!(
                    "closing </{}> with no open element",
                    cname
                )));
            }
        }
        match self.pending.take() {
            Some(start) => self.writer.write_event(Event::Empty(start))?,
            None => self.writer.write_event(Event::End(BytesEnd::new(cname)))?,
        }
        self.scopes.pop_scope();
        Ok(())
    }

    fn write_attribute(&mut self, name: &QualifiedName, value: &str) -> Result<()> {
        if self.pending.is_none() {
            return Err(SerdeError::AttributeAfterContent {
                name: name.to_string(),
            });
        }
        if self.repair_namespaces && !name.prefix().is_empty() && !name.is_namespace_declaration() {
            self.ensure_declared(name.prefix(), name.namespace_uri())?;
        }
        if let Some(start) = self.pending.as_mut() {
            start.push_attribute((name.to_cname().as_str(), value));
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.write_pending()?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
        if self.scopes.declared_here(prefix) == Some(uri) || uri == XMLNS_ATTRIBUTE_NS_URI {
            return Ok(());
        }
        let Some(start) = self.pending.as_mut() else {
            return Err(SerdeError::AttributeAfterContent {
                name: format!("{}:{}", XMLNS_ATTRIBUTE, prefix),
            });
        };
        let attribute = if prefix.is_empty() {
            XMLNS_ATTRIBUTE.to_string()
        } else {
            format!("{}:{}", XMLNS_ATTRIBUTE, prefix)
        };
        start.push_attribute((attribute.as_str(), uri));
        self.scopes.declare(prefix, uri);
        Ok(())
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.scopes.namespace_uri(prefix).map(str::to_string)
    }
}

/// Routes one structure's output while its fields are being reordered.
///
/// Attributes of the structure itself (depth 0) go straight to `parent`,
/// which still has the structure's start tag open; everything else is
/// recorded in `buffer` until the encoder flushes it.
pub struct InvertedSink<'a> {
    parent: &'a mut dyn XmlSink,
    buffer: &'a mut BufferedWriter,
    depth: usize,
}

impl<'a> InvertedSink<'a> {
    pub fn new(parent: &'a mut dyn XmlSink, buffer: &'a mut BufferedWriter) -> Self {
        Self {
            parent,
            buffer,
            depth: 0,
        }
    }
}

impl XmlSink for InvertedSink<'_> {
    fn start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.depth += 1;
        self.buffer.start_tag(name)
    }

    fn smart_start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.depth += 1;
        self.buffer.smart_start_tag(name)
    }

    fn end_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.buffer.end_tag(name)
    }

    fn write_attribute(&mut self, name: &QualifiedName, value: &str) -> Result<()> {
        if self.depth == 0 {
            self.parent.write_attribute(name, value)
        } else {
            self.buffer.write_attribute(name, value)
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.buffer.text(text)
    }

    fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
        if self.depth == 0 {
            self.parent.namespace_attr(prefix, uri)
        } else {
            self.buffer.namespace_attr(prefix, uri)
        }
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.buffer
            .declared_namespace(prefix)
            .or_else(|| self.parent.namespace_uri(prefix))
    }
}
