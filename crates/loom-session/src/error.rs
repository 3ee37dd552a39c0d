//! Error types for loom-session

use thiserror::Error;

/// Result type alias using loom-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the dev server or local storage
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the protocol layer
    #[error(transparent)]
    Protocol(#[from] loom_protocol::Error),

    /// WebSocket handshake or transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local storage I/O failed
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Server URL could not be turned into a channel URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The connection task is gone
    #[error("Connection closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}

impl Error {
    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::WebSocket(_) | Error::Closed => true,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_variants() {
        assert!(Error::Closed.is_transient());
        assert!(
            Error::Status {
                status: 503,
                url: "http://x".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Status {
                status: 404,
                url: "http://x".into()
            }
            .is_transient()
        );
        assert!(!Error::InvalidUrl("ftp://x".into()).is_transient());
    }

    #[test]
    fn test_websocket_error_converts() {
        let e: Error = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(e, Error::WebSocket(_)));
        assert!(e.is_transient());
    }
}
