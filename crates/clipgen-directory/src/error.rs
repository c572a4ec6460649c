//! Directory client error types.

use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur talking to the camera directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl DirectoryError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DirectoryError::ServerError(..) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            DirectoryError::from_http_status(404, "x"),
            DirectoryError::NotFound(_)
        ));
        let server = DirectoryError::from_http_status(503, "x");
        assert!(matches!(server, DirectoryError::ServerError(503, _)));
        assert!(server.is_retryable());

        let client = DirectoryError::from_http_status(400, "x");
        assert!(matches!(client, DirectoryError::RequestFailed(_)));
        assert!(!client.is_retryable());
    }
}
