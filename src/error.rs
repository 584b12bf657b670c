//! Error types for notification-link.

use thiserror::Error;

/// Errors produced by the transport, the STOMP codec, configuration
/// parsing and the inbox client.
///
/// The [`NotificationChannel`](crate::NotificationChannel) public API never
/// returns these; it logs them and reports them through
/// [`EventHandlers::on_error`](crate::EventHandlers::on_error) instead.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::SerializationError(err.to_string())
    }
}

impl LinkError {
    /// Whether retrying the failed operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LinkError::WebSocketError(_) | LinkError::TimeoutError(_) => true,
            LinkError::HttpError(e) => e.is_timeout() || e.is_connect(),
            LinkError::ServerError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Result type for notification-link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LinkError::WebSocketError("reset".into()).is_transient());
        assert!(LinkError::TimeoutError("connect".into()).is_transient());
        assert!(LinkError::ServerError { status_code: 503, message: "busy".into() }.is_transient());
        assert!(!LinkError::ServerError { status_code: 400, message: "bad".into() }.is_transient());
        assert!(!LinkError::ProtocolError("ERROR frame".into()).is_transient());
        assert!(!LinkError::ConfigurationError("url".into()).is_transient());
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err: LinkError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, LinkError::SerializationError(_)));
    }
}
