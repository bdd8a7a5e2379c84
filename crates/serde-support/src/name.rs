//! Qualified names.
//!
//! A [`QualifiedName`] is the XML identity of a tag or attribute. The prefix is
//! carried for display and for choosing namespace declarations on output, but
//! it never takes part in matching: two names denote the same tag when their
//! [normalized](QualifiedName::normalize) forms are equal.

use std::fmt;

use crate::namespace::NamespaceContext;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of `xmlns` pseudo-attributes.
pub const XMLNS_ATTRIBUTE_NS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Name (and prefix) of namespace declaration attributes.
pub const XMLNS_ATTRIBUTE: &str = "xmlns";

/// Namespace URI + local name + display prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    namespace_uri: String,
    local_name: String,
    prefix: String,
}

impl QualifiedName {
    /// A name without namespace and without prefix.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: String::new(),
            local_name: local_name.into(),
            prefix: String::new(),
        }
    }

    /// A name in `namespace_uri` using the default (empty) prefix.
    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(
        namespace_uri: impl Into<String>,
        local_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
            prefix: prefix.into(),
        }
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A sibling name: `local_name` in the same namespace and with the same
    /// prefix as `self`. Field names inherit their owner's namespace this way.
    pub fn sibling(&self, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: self.namespace_uri.clone(),
            local_name: local_name.into(),
            prefix: self.prefix.clone(),
        }
    }

    /// Drops the prefix and fills in an empty namespace from the binding of
    /// the name's prefix in `context`.
    ///
    /// An unprefixed attribute (empty namespace) therefore matches a field
    /// declared in the default namespace of the element it appears on.
    pub fn normalize(&self, context: &dyn NamespaceContext) -> QualifiedName {
        let namespace_uri = if self.namespace_uri.is_empty() {
            context
                .namespace_uri(&self.prefix)
                .unwrap_or_default()
                .to_string()
        } else {
            self.namespace_uri.clone()
        };
        QualifiedName {
            namespace_uri,
            local_name: self.local_name.clone(),
            prefix: String::new(),
        }
    }

    /// `prefix:local`, or just `local` for the default prefix.
    pub fn to_cname(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }

    /// Resolves a prefixed name (`prefix:local` or `local`) against `context`.
    ///
    /// Unbound prefixes resolve to the empty namespace.
    pub fn from_cname(cname: &str, context: &dyn NamespaceContext) -> QualifiedName {
        let (prefix, local_name) = match cname.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", cname),
        };
        QualifiedName {
            namespace_uri: context
                .namespace_uri(prefix)
                .unwrap_or_default()
                .to_string(),
            local_name: local_name.to_string(),
            prefix: prefix.to_string(),
        }
    }

    /// Parses Clark notation: `{namespace}local` or `local`.
    pub fn from_clark(text: &str) -> Option<QualifiedName> {
        match text.strip_prefix('{') {
            Some(rest) => {
                let (namespace_uri, local_name) = rest.split_once('}')?;
                Some(QualifiedName::new(namespace_uri, local_name))
            }
            None if text.contains('}') => None,
            None => Some(QualifiedName::local(text)),
        }
    }

    /// Whether this attribute name is a namespace declaration (`xmlns` or
    /// `xmlns:p`).
    pub fn is_namespace_declaration(&self) -> bool {
        self.namespace_uri == XMLNS_ATTRIBUTE_NS_URI
            || self.prefix == XMLNS_ATTRIBUTE
            || (self.prefix.is_empty() && self.local_name == XMLNS_ATTRIBUTE)
    }
}

/// Clark notation, the form used in error messages.
impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceScopes;

    #[test]
    fn test_normalize_ignores_prefix() {
        let scopes = NamespaceScopes::new();
        let a = QualifiedName::with_prefix("urn:a", "item", "a");
        let b = QualifiedName::with_prefix("urn:a", "item", "other");
        assert_ne!(a, b);
        assert_eq!(a.normalize(&scopes), b.normalize(&scopes));
    }

    #[test]
    fn test_normalize_fills_default_namespace() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("", "urn:default");

        let attribute = QualifiedName::local("id");
        let field = QualifiedName::new("urn:default", "id");
        assert_eq!(attribute.normalize(&scopes), field.normalize(&scopes));
    }

    #[test]
    fn test_cname_round_trip() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("p", "urn:p");

        let name = QualifiedName::from_cname("p:item", &scopes);
        assert_eq!(name.namespace_uri(), "urn:p");
        assert_eq!(name.local_name(), "item");
        assert_eq!(name.to_cname(), "p:item");
        assert_eq!(QualifiedName::local("x").to_cname(), "x");
    }

    #[test]
    fn test_clark_notation() {
        let name = QualifiedName::from_clark("{urn:x}item").unwrap();
        assert_eq!(name, QualifiedName::new("urn:x", "item"));
        assert_eq!(name.to_string(), "{urn:x}item");
        assert_eq!(QualifiedName::from_clark("plain"), Some(QualifiedName::local("plain")));
        assert_eq!(QualifiedName::from_clark("bad}name"), None);
    }

    #[test]
    fn test_namespace_declaration_detection() {
        assert!(QualifiedName::local("xmlns").is_namespace_declaration());
        assert!(QualifiedName::with_prefix("", "p", "xmlns").is_namespace_declaration());
        assert!(!QualifiedName::local("id").is_namespace_declaration());
    }
}
