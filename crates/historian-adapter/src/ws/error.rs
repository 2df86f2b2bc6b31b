/*
[INPUT]:  Error sources (WebSocket transport, serialization, URL parsing, RPC routing)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Main error type for the historian adapter.
///
/// Errors reported by the server inside a response (`ApiError`) are data and
/// never end up here; this enum covers everything that prevents a response
/// from being obtained at all.
#[derive(Error, Debug)]
pub enum HistorianError {
    /// WebSocket transport failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A request was issued before `connect_ws` succeeded
    #[error("WebSocket not connected")]
    NotConnected,

    /// `connect_ws` was called on a client that is already connected
    #[error("WebSocket already connected")]
    AlreadyConnected,

    /// The socket closed while a request was waiting for its response
    #[error("Connection closed before response to request {reqid}")]
    ConnectionClosed { reqid: u64 },

    /// No response arrived in time
    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Request rejected locally before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The server answered with neither data nor errors where data is required
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl HistorianError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HistorianError::WebSocket(_)
                | HistorianError::Timeout { .. }
                | HistorianError::ConnectionClosed { .. }
                | HistorianError::InvalidResponse(_)
        )
    }

    /// Check if the error means the connection is unusable
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            HistorianError::WebSocket(_)
                | HistorianError::NotConnected
                | HistorianError::ConnectionClosed { .. }
        )
    }
}

/// Result type alias for historian operations
pub type Result<T> = std::result::Result<T, HistorianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let timeout_err = HistorianError::Timeout { duration_ms: 250 };
        assert!(timeout_err.is_retryable());
        assert!(!timeout_err.is_connection_error());

        let request_err = HistorianError::InvalidRequest("empty".to_string());
        assert!(!request_err.is_retryable());
    }

    #[test]
    fn test_error_is_connection_error() {
        assert!(HistorianError::NotConnected.is_connection_error());
        assert!(HistorianError::ConnectionClosed { reqid: 3 }.is_connection_error());
        assert!(!HistorianError::AlreadyConnected.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = HistorianError::ConnectionClosed { reqid: 42 };
        assert_eq!(err.to_string(), "Connection closed before response to request 42");

        let err = HistorianError::Timeout { duration_ms: 250 };
        assert_eq!(err.to_string(), "Request timeout after 250ms");
    }
}
