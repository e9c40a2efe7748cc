//! Error types for value encoding and decoding
//!
//! Per-value failures never abort a whole operation: callers of the
//! storage API see `None` for the affected entry and the error is logged.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors raised while turning a value into a document or back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The recorded type name is not known to the type resolver
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The payload does not fit the resolved type (or the value could not
    /// be represented as a document)
    #[error("Mapping error for type {type_name}: {message}")]
    Mapping {
        /// Type the payload was mapped to or from
        type_name: String,
        /// Underlying serde message
        message: String,
    },

    /// A registered type adapter rejected the document
    #[error("Adapter error for type {type_name}: {message}")]
    Adapter {
        /// Type whose adapter failed
        type_name: String,
        /// Adapter message
        message: String,
    },
}

impl CodecError {
    /// Build a mapping error from a serde failure
    pub fn mapping(type_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CodecError::Mapping {
            type_name: type_name.into(),
            message: err.to_string(),
        }
    }

    /// Build an adapter error
    pub fn adapter(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        CodecError::Adapter {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Type name the error refers to
    pub fn type_name(&self) -> &str {
        match self {
            CodecError::UnknownType(name) => name,
            CodecError::Mapping { type_name, .. } | CodecError::Adapter { type_name, .. } => {
                type_name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_type() {
        let err = CodecError::UnknownType("acme::Thing".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Unknown type"));
        assert!(msg.contains("acme::Thing"));
    }

    #[test]
    fn test_error_display_mapping() {
        let err = CodecError::mapping("acme::Thing", "missing field `uid`");
        let msg = err.to_string();
        assert!(msg.contains("Mapping error"));
        assert!(msg.contains("missing field `uid`"));
    }

    #[test]
    fn test_type_name_accessor() {
        assert_eq!(CodecError::UnknownType("a".into()).type_name(), "a");
        assert_eq!(CodecError::adapter("b", "bad").type_name(), "b");
        assert_eq!(CodecError::mapping("c", "bad").type_name(), "c");
    }
}
