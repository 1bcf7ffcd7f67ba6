//! Error types for mdv.

use thiserror::Error;

/// Top-level result type for mdv operations.
pub type Result<T> = std::result::Result<T, MdvError>;

/// Top-level error type for mdv.
#[derive(Debug, Error)]
pub enum MdvError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("config error: {0}")]
    Config(String),

    #[error("vault error: {0}")]
    Vault(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while loading or querying a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown schema type: {0}")]
    UnknownType(String),

    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("invalid field type '{0}' (expected string, number, url, date, datetime, bool, enum or ref, optionally suffixed with [])")]
    InvalidFieldType(String),

    #[error("schema parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_human_readable_messages() {
        let err = SchemaError::UnknownField {
            type_name: "person".to_string(),
            field: "email".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("email"));
        assert!(msg.contains("person"));

        let err: MdvError = SchemaError::UnknownType("meeting".to_string()).into();
        assert_eq!(err.to_string(), "schema error: unknown schema type: meeting");
    }
}
