use thiserror::Error;
use weft_serde_support::policy::KindConflict;

/// Error types for XML encoding and decoding.
#[derive(Debug, Error)]
pub enum SerdeError {
    /// An attribute or element name that matches no field of the structure
    /// being decoded.
    #[error("could not find a field for name {name}; candidates were: {}", .candidates.join(", "))]
    UnknownName {
        name: String,
        candidates: Vec<String>,
    },

    /// Required fields that never appeared before the element closed, all of
    /// them, in declaration order.
    #[error("{structure} is missing required fields: {}", .fields.join(", "))]
    MissingFields {
        structure: String,
        fields: Vec<String>,
    },

    /// Content whose shape does not fit the structure being read or written.
    #[error("malformed content: {0}")]
    Malformed(String),

    #[error("unsupported top-level value: {0}")]
    UnsupportedTopLevel(String),

    #[error("invalid {expected} value {value:?}")]
    InvalidValue {
        expected: &'static str,
        value: String,
    },

    /// An attribute reached the writer after the element already had content.
    #[error("attribute {name} written after element content")]
    AttributeAfterContent { name: String },

    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl From<KindConflict> for SerdeError {
    fn from(err: KindConflict) -> Self {
        SerdeError::Malformed(err.to_string())
    }
}

impl From<String> for SerdeError {
    fn from(msg: String) -> Self {
        SerdeError::Custom(msg)
    }
}

impl From<&str> for SerdeError {
    fn from(msg: &str) -> Self {
        SerdeError::Custom(msg.to_string())
    }
}

impl serde::ser::Error for SerdeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerdeError::Custom(msg.to_string())
    }
}

impl serde::de::Error for SerdeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerdeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        SerdeError::MissingFields {
            structure: String::new(),
            fields: vec![field.to_string()],
        }
    }
}

/// Result type alias for XML encoding and decoding.
pub type Result<T> = std::result::Result<T, SerdeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::Error as _;

    #[test]
    fn test_unknown_name_lists_candidates() {
        let err = SerdeError::UnknownName {
            name: "{urn:x}bogus".to_string(),
            candidates: vec!["id".to_string(), "name".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "could not find a field for name {urn:x}bogus; candidates were: id, name"
        );
    }

    #[test]
    fn test_serde_missing_field_is_structured() {
        match SerdeError::missing_field("tags") {
            SerdeError::MissingFields { fields, .. } => assert_eq!(fields, vec!["tags"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
