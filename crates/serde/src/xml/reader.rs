//! Pull reader over quick-xml.
//!
//! Produces owned [`XmlEvent`]s with namespace-resolved names. Adjacent text,
//! CDATA and entity references are merged into one text event, empty
//! elements are reported as a start followed by an end, and declarations,
//! processing instructions and doctypes are dropped.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use weft_serde_support::name::{XMLNS_ATTRIBUTE, XMLNS_ATTRIBUTE_NS_URI};
use weft_serde_support::{NamespaceScopes, QualifiedName};

use crate::error::{Result, SerdeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    StartElement,
    EndElement,
    Text,
    Attribute,
    Comment,
    EntityRef,
    IgnorableWhitespace,
    EndDocument,
}

impl EventType {
    pub fn is_ignorable(self) -> bool {
        matches!(self, EventType::Comment | EventType::IgnorableWhitespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QualifiedName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    pub name: QualifiedName,
    pub attributes: Vec<XmlAttribute>,
}

impl StartElement {
    /// Value of an attribute without namespace, looked up by local name.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.prefix().is_empty() && a.name.local_name() == local_name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement(StartElement),
    EndElement(QualifiedName),
    Text(String),
    /// Text consisting only of whitespace.
    Whitespace(String),
    Comment(String),
    EndDocument,
}

impl XmlEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            XmlEvent::StartElement(_) => EventType::StartElement,
            XmlEvent::EndElement(_) => EventType::EndElement,
            XmlEvent::Text(_) => EventType::Text,
            XmlEvent::Whitespace(_) => EventType::IgnorableWhitespace,
            XmlEvent::Comment(_) => EventType::Comment,
            XmlEvent::EndDocument => EventType::EndDocument,
        }
    }

    pub fn is_ignorable(&self) -> bool {
        self.event_type().is_ignorable()
    }
}

pub struct XmlEventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    queue: VecDeque<XmlEvent>,
    scopes: NamespaceScopes,
}

impl<R: BufRead> XmlEventReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            queue: VecDeque::new(),
            scopes: NamespaceScopes::new(),
        }
    }

    /// Bindings in effect for the most recently read start tag.
    pub fn scopes(&self) -> &NamespaceScopes {
        &self.scopes
    }

    pub fn peek_event(&mut self) -> Result<&XmlEvent> {
        if self.queue.is_empty() {
            self.fill()?;
        }
        self.queue.front().ok_or(SerdeError::UnexpectedEof)
    }

    pub fn next_event(&mut self) -> Result<XmlEvent> {
        if self.queue.is_empty() {
            self.fill()?;
        }
        let event = self.queue.pop_front().ok_or(SerdeError::UnexpectedEof)?;
        if let XmlEvent::EndElement(_) = event {
            self.scopes.pop_scope();
        }
        Ok(event)
    }

    /// Consumes comments and whitespace up to the next significant event.
    pub fn skip_ignorable(&mut self) -> Result<()> {
        while self.peek_event()?.is_ignorable() {
            self.next_event()?;
        }
        Ok(())
    }

    /// The next start or end tag. Text in between is an error.
    pub fn next_tag(&mut self) -> Result<XmlEvent> {
        loop {
            match self.next_event()? {
                event @ (XmlEvent::StartElement(_) | XmlEvent::EndElement(_)) => return Ok(event),
                XmlEvent::Text(text) => {
                    return Err(SerdeError::Malformed(format!(
                        "expected a tag, found text {:?}",
                        text
                    )));
                }
                XmlEvent::EndDocument => return Err(SerdeError::UnexpectedEof),
                XmlEvent::Comment(_) | XmlEvent::Whitespace(_) => continue,
            }
        }
    }

    /// Reads the next tag and requires it to open `expected`.
    pub fn require_start(&mut self, expected: &QualifiedName) -> Result<StartElement> {
        match self.next_tag()? {
            XmlEvent::StartElement(start) => {
                if start.name.normalize(&self.scopes) == expected.normalize(&self.scopes) {
                    Ok(start)
                } else {
                    Err(SerdeError::UnknownName {
                        name: start.name.to_string(),
                        candidates: vec![expected.to_string()],
                    })
                }
            }
            XmlEvent::EndElement(name) => Err(SerdeError::Malformed(format!(
                "expected <{}>, found </{}>",
                expected.to_cname(),
                name.to_cname()
            ))),
            _ => Err(SerdeError::UnexpectedEof),
        }
    }

    /// Reads the next tag and requires it to be an end tag.
    pub fn require_end(&mut self) -> Result<QualifiedName> {
        match self.next_tag()? {
            XmlEvent::EndElement(name) => Ok(name),
            XmlEvent::StartElement(start) => Err(SerdeError::Malformed(format!(
                "unexpected element <{}>",
                start.name.to_cname()
            ))),
            _ => Err(SerdeError::UnexpectedEof),
        }
    }

    /// Consumes everything up to and including the end tag of the element
    /// whose start tag was read last.
    pub fn skip_element(&mut self) -> Result<()> {
        let mut depth = 1usize;
        loop {
            match self.next_event()? {
                XmlEvent::StartElement(_) => depth += 1,
                XmlEvent::EndElement(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                XmlEvent::EndDocument => return Err(SerdeError::UnexpectedEof),
                _ => {}
            }
        }
    }

    /// Collects the text of the element whose start tag was read last and
    /// consumes its end tag. Child elements are an error.
    pub fn read_simple_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(t) | XmlEvent::Whitespace(t) => text.push_str(&t),
                XmlEvent::Comment(_) => {}
                XmlEvent::EndElement(_) => return Ok(text),
                XmlEvent::StartElement(start) => {
                    return Err(SerdeError::Malformed(format!(
                        "element <{}> found where only text was expected",
                        start.name.to_cname()
                    )));
                }
                XmlEvent::EndDocument => return Err(SerdeError::UnexpectedEof),
            }
        }
    }

    /// Requires that nothing but comments and whitespace remain.
    pub fn expect_end_document(&mut self) -> Result<()> {
        self.skip_ignorable()?;
        match self.next_event()? {
            XmlEvent::EndDocument => Ok(()),
            other => Err(SerdeError::Malformed(format!(
                "unexpected {:?} after the root element",
                other.event_type()
            ))),
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut text: Option<String> = None;
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            let converted = match event {
                Event::Text(t) => {
                    text.get_or_insert_with(String::new).push_str(utf8(&t)?);
                    continue;
                }
                Event::CData(c) => {
                    text.get_or_insert_with(String::new).push_str(utf8(&c)?);
                    continue;
                }
                Event::GeneralRef(reference) => {
                    let resolved = resolve_reference(utf8(&reference)?)?;
                    text.get_or_insert_with(String::new).push_str(&resolved);
                    continue;
                }
                Event::Start(start) => vec![XmlEvent::StartElement(start_element(
                    &start,
                    &mut self.scopes,
                )?)],
                Event::Empty(start) => {
                    let start = start_element(&start, &mut self.scopes)?;
                    let end = start.name.clone();
                    vec![XmlEvent::StartElement(start), XmlEvent::EndElement(end)]
                }
                Event::End(end) => {
                    let name = end.name();
                    let cname = utf8(name.as_ref())?;
                    vec![XmlEvent::EndElement(QualifiedName::from_cname(
                        cname,
                        &self.scopes,
                    ))]
                }
                Event::Comment(c) => vec![XmlEvent::Comment(utf8(&c)?.to_string())],
                Event::Eof => vec![XmlEvent::EndDocument],
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
            };

            if let Some(text) = text.take() {
                self.queue.push_back(classify_text(text));
            }
            self.queue.extend(converted);
            return Ok(());
        }
    }
}

/// Markup and text must be valid UTF-8; nothing is replaced silently.
fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| SerdeError::Malformed(format!("invalid UTF-8 in document: {}", e)))
}

fn classify_text(text: String) -> XmlEvent {
    if text.chars().all(char::is_whitespace) {
        XmlEvent::Whitespace(text)
    } else {
        XmlEvent::Text(text)
    }
}

fn start_element(start: &BytesStart<'_>, scopes: &mut NamespaceScopes) -> Result<StartElement> {
    scopes.push_scope();

    let mut raw = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| SerdeError::Malformed(format!("invalid attribute: {}", e)))?;
        let key = utf8(attribute.key.as_ref())?.to_string();
        let value = quick_xml::escape::unescape(utf8(&attribute.value)?)
            .map_err(|e| SerdeError::Malformed(format!("invalid attribute value: {}", e)))?
            .into_owned();
        if key == XMLNS_ATTRIBUTE {
            scopes.declare("", &value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scopes.declare(prefix, &value);
        }
        raw.push((key, value));
    }

    let name = QualifiedName::from_cname(utf8(start.name().as_ref())?, scopes);
    let attributes = raw
        .into_iter()
        .map(|(key, value)| XmlAttribute {
            name: attribute_name(&key, scopes),
            value,
        })
        .collect();
    Ok(StartElement { name, attributes })
}

/// Unprefixed attributes have no namespace of their own.
fn attribute_name(key: &str, scopes: &NamespaceScopes) -> QualifiedName {
    if key == XMLNS_ATTRIBUTE {
        QualifiedName::new(XMLNS_ATTRIBUTE_NS_URI, key)
    } else if key.contains(':') {
        QualifiedName::from_cname(key, scopes)
    } else {
        QualifiedName::local(key)
    }
}

fn resolve_reference(name: &str) -> Result<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => number.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| SerdeError::Malformed(format!("invalid character reference &{};", name)));
    }
    quick_xml::escape::resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| SerdeError::Malformed(format!("unknown entity &{};", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(xml: &str) -> XmlEventReader<&[u8]> {
        XmlEventReader::new(xml.as_bytes())
    }

    fn start(event: XmlEvent) -> StartElement {
        match event {
            XmlEvent::StartElement(start) => start,
            other => panic!("expected a start tag, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_references_coalesce() {
        let mut r = reader("<a>x &amp; y&#33;<![CDATA[<z>]]></a>");
        start(r.next_event().unwrap());
        assert_eq!(r.next_event().unwrap(), XmlEvent::Text("x & y!<z>".to_string()));
        assert!(matches!(r.next_event().unwrap(), XmlEvent::EndElement(_)));
        assert_eq!(r.next_event().unwrap(), XmlEvent::EndDocument);
    }

    #[test]
    fn test_empty_element_splits() {
        let mut r = reader(r#"<a id="1"/>"#);
        let a = start(r.next_event().unwrap());
        assert_eq!(a.attribute("id"), Some("1"));
        assert_eq!(
            r.next_event().unwrap(),
            XmlEvent::EndElement(QualifiedName::local("a"))
        );
    }

    #[test]
    fn test_names_resolve_against_scopes() {
        let mut r = reader(r#"<p:a xmlns:p="urn:p" xmlns="urn:d" p:x="1" y="2"><b/></p:a>"#);
        let a = start(r.next_event().unwrap());
        assert_eq!(a.name, QualifiedName::with_prefix("urn:p", "a", "p"));
        let names: Vec<_> = a
            .attributes
            .iter()
            .filter(|attr| !attr.name.is_namespace_declaration())
            .map(|attr| attr.name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                QualifiedName::with_prefix("urn:p", "x", "p"),
                QualifiedName::local("y"),
            ]
        );
        let b = start(r.next_event().unwrap());
        assert_eq!(b.name, QualifiedName::new("urn:d", "b"));
    }

    #[test]
    fn test_scope_lasts_until_end_is_consumed() {
        let mut r = reader(r#"<a xmlns:p="urn:p"/>"#);
        start(r.next_event().unwrap());
        r.peek_event().unwrap();
        assert_eq!(r.scopes().depth(), 1);
        r.next_event().unwrap();
        assert_eq!(r.scopes().depth(), 0);
    }

    #[test]
    fn test_whitespace_is_ignorable() {
        let mut r = reader("<a>\n  <!-- note -->\n  <b>t</b>\n</a>");
        start(r.next_event().unwrap());
        let b = match r.next_tag().unwrap() {
            XmlEvent::StartElement(b) => b,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(b.name.local_name(), "b");
        assert_eq!(r.read_simple_text().unwrap(), "t");
        r.require_end().unwrap();
        r.expect_end_document().unwrap();
    }

    #[test]
    fn test_skip_element_consumes_subtree() {
        let mut r = reader("<a><skip><x/><y>t</y></skip><keep/></a>");
        start(r.next_event().unwrap());
        start(r.next_event().unwrap());
        r.skip_element().unwrap();
        let keep = start(r.next_event().unwrap());
        assert_eq!(keep.name.local_name(), "keep");
    }

    #[test]
    fn test_read_simple_text_rejects_children() {
        let mut r = reader("<a>t<b/></a>");
        start(r.next_event().unwrap());
        assert!(matches!(
            r.read_simple_text(),
            Err(SerdeError::Malformed(_))
        ));
    }

    #[test]
    fn test_require_start_mismatch() {
        let mut r = reader("<other/>");
        let err = r.require_start(&QualifiedName::local("item")).unwrap_err();
        assert!(matches!(err, SerdeError::UnknownName { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut r = XmlEventReader::new(&b"<a>ok \xff</a>"[..]);
        start(r.next_event().unwrap());
        assert!(matches!(r.next_event(), Err(SerdeError::Malformed(_))));

        let mut r = XmlEventReader::new(&b"<a b=\"\xfe\"/>"[..]);
        assert!(matches!(r.next_event(), Err(SerdeError::Malformed(_))));
    }
}
