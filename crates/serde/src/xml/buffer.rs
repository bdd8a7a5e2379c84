//! In-memory write target.

use weft_serde_support::{NamespaceContext, NamespaceScopes, QualifiedName};

use super::writer::XmlSink;
use crate::error::Result;

/// One recorded writer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedEvent {
    StartTag(QualifiedName),
    SmartStartTag(QualifiedName),
    EndTag(QualifiedName),
    Attribute(QualifiedName, String),
    Text(String),
    NamespaceAttr { prefix: String, uri: String },
}

/// Records writer calls so they can be replayed onto another sink later.
///
/// Namespace declarations made explicitly inside the buffer are tracked so
/// lookups see them before the events reach a real writer; declarations the
/// target adds on replay are not.
#[derive(Debug, Default)]
pub struct BufferedWriter {
    events: Vec<BufferedEvent>,
    scopes: NamespaceScopes,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[BufferedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A binding declared inside the buffered content that is still in scope.
    pub fn declared_namespace(&self, prefix: &str) -> Option<String> {
        if self.scopes.depth() == 0 {
            return None;
        }
        self.scopes.namespace_uri(prefix).map(str::to_string)
    }

    /// Replays every recorded call onto `target` in order and empties the
    /// buffer.
    pub fn flush_to(&mut self, target: &mut dyn XmlSink) -> Result<()> {
        self.scopes = NamespaceScopes::new();
        for event in self.events.drain(..) {
            match event {
                BufferedEvent::StartTag(name) => target.start_tag(&name)?,
                BufferedEvent::SmartStartTag(name) => target.smart_start_tag(&name)?,
                BufferedEvent::EndTag(name) => target.end_tag(&name)?,
                BufferedEvent::Attribute(name, value) => target.write_attribute(&name, &value)?,
                BufferedEvent::Text(text) => target.text(&text)?,
                BufferedEvent::NamespaceAttr { prefix, uri } => {
                    target.namespace_attr(&prefix, &uri)?
                }
            }
        }
        Ok(())
    }
}

impl XmlSink for BufferedWriter {
    fn start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.scopes.push_scope();
        self.events.push(BufferedEvent::StartTag(name.clone()));
        Ok(())
    }

    fn smart_start_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.scopes.push_scope();
        self.events.push(BufferedEvent::SmartStartTag(name.clone()));
        Ok(())
    }

    fn end_tag(&mut self, name: &QualifiedName) -> Result<()> {
        self.scopes.pop_scope();
        self.events.push(BufferedEvent::EndTag(name.clone()));
        Ok(())
    }

    fn write_attribute(&mut self, name: &QualifiedName, value: &str) -> Result<()> {
        self.events
            .push(BufferedEvent::Attribute(name.clone(), value.to_string()));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.events.push(BufferedEvent::Text(text.to_string()));
        Ok(())
    }

    fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.scopes.declare(prefix, uri);
        self.events.push(BufferedEvent::NamespaceAttr {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.scopes.namespace_uri(prefix).map(str::to_string)
    }
}
