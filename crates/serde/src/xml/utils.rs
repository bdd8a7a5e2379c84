//! Scalar conversions shared by the encoder and decoder.

use std::str::FromStr;

use crate::error::{Result, SerdeError};

/// Name of the discriminator attribute on non-transparent polymorphic values.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Converts a Rust boolean to its string representation for XML.
pub fn bool_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

/// Parses `xs:boolean` lexical forms.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SerdeError::InvalidValue {
            expected: "boolean",
            value: value.to_string(),
        }),
    }
}

/// Parses a number or other `FromStr` scalar, ignoring surrounding whitespace.
pub fn parse_scalar<T: FromStr>(value: &str, expected: &'static str) -> Result<T> {
    value.trim().parse().map_err(|_| SerdeError::InvalidValue {
        expected,
        value: value.to_string(),
    })
}

pub fn parse_char(value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SerdeError::InvalidValue {
            expected: "single character",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_to_string() {
        assert_eq!(bool_to_string(true), "true");
        assert_eq!(bool_to_string(false), "false");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool(" false ").unwrap());
        assert!(matches!(
            parse_bool("yes"),
            Err(SerdeError::InvalidValue { expected: "boolean", .. })
        ));
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar::<i32>(" 42 ", "i32").unwrap(), 42);
        assert_eq!(parse_scalar::<f64>("1.5", "f64").unwrap(), 1.5);
        assert!(parse_scalar::<u8>("300", "u8").is_err());
    }

    #[test]
    fn test_parse_char() {
        assert_eq!(parse_char("x").unwrap(), 'x');
        assert!(parse_char("").is_err());
        assert!(parse_char("xy").is_err());
    }
}
