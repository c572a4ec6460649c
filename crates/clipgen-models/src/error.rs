//! Model error types.

use thiserror::Error;

/// Result type for model parsing and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing requests and segment identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Malformed segment identifier '{identifier}': {reason}")]
    MalformedIdentifier { identifier: String, reason: String },
}

impl ModelError {
    pub fn malformed_request(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    pub fn malformed_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}
