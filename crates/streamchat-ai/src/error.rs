//! Error types for the chat client

use thiserror::Error;

/// Chat client error types
#[derive(Error, Debug)]
pub enum ChatError {
    /// The exchange failed at the transport level, or the service answered
    /// with a non-success status and no error payload.
    #[error("{}", transport_message(.status, .body))]
    Transport {
        status: Option<u16>,
        body: Option<String>,
    },

    /// Well-formed error payload returned by the service.
    #[error("{0}")]
    Api(String),

    #[error("{0}")]
    Validation(String),

    #[error("Received empty response")]
    EmptyResponse,

    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub fn transport(status: Option<u16>, body: Option<String>) -> Self {
        ChatError::Transport { status, body }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    /// Whether the error was raised before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}

fn transport_message(status: &Option<u16>, body: &Option<String>) -> String {
    match status {
        Some(code) => format!(
            "Request failed with code {}: {}",
            code,
            body.as_deref().unwrap_or("")
        ),
        None => "Request failed".to_string(),
    }
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_includes_status_and_body() {
        let err = ChatError::transport(Some(500), Some("boom".to_string()));
        assert_eq!(err.to_string(), "Request failed with code 500: boom");
    }

    #[test]
    fn transport_error_without_response_is_generic() {
        let err = ChatError::transport(None, None);
        assert_eq!(err.to_string(), "Request failed");
    }

    #[test]
    fn api_and_validation_errors_surface_message_verbatim() {
        assert_eq!(ChatError::Api("bad key".to_string()).to_string(), "bad key");
        let validation = ChatError::validation("API Key is required");
        assert!(validation.is_validation());
        assert_eq!(validation.to_string(), "API Key is required");
    }
}
