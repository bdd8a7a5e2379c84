//! Namespace contexts.

use crate::name::{XML_NS_URI, XMLNS_ATTRIBUTE, XMLNS_ATTRIBUTE_NS_URI};

/// Resolves prefixes to namespace URIs.
pub trait NamespaceContext {
    /// The URI bound to `prefix`, or `None` when the prefix is unbound.
    fn namespace_uri(&self, prefix: &str) -> Option<&str>;
}

/// Prefix bindings for the currently open elements, innermost last.
///
/// One scope is pushed per start tag and popped with the matching end tag.
/// The reserved `xml` and `xmlns` prefixes are always bound.
#[derive(Debug, Clone)]
pub struct NamespaceScopes {
    scopes: Vec<Vec<(String, String)>>,
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Pops the innermost scope. The document-level scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of open element scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Binds `prefix` in the innermost scope, replacing an earlier binding of
    /// the same prefix in that scope.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            match scope.iter_mut().find(|(p, _)| p == prefix) {
                Some(binding) => binding.1 = uri.to_string(),
                None => scope.push((prefix.to_string(), uri.to_string())),
            }
        }
    }

    /// The binding of `prefix` made by the innermost scope itself, ignoring
    /// bindings inherited from enclosing scopes.
    pub fn declared_here(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .last()?
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

impl NamespaceContext for NamespaceScopes {
    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            if let Some((_, uri)) = scope.iter().find(|(p, _)| p == prefix) {
                return Some(uri.as_str());
            }
        }
        match prefix {
            "xml" => Some(XML_NS_URI),
            XMLNS_ATTRIBUTE => Some(XMLNS_ATTRIBUTE_NS_URI),
            _ => None,
        }
    }
}
