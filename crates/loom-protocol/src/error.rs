//! Error types for loom-protocol

use thiserror::Error;

/// Result type alias using loom-protocol Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when encoding or decoding protocol data
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame parsed as JSON but is not a protocol object
    #[error("Unexpected frame: {0}")]
    UnexpectedFrame(String),
}

impl Error {
    /// Whether the error came from malformed input rather than an encoding bug
    pub fn is_malformed_input(&self) -> bool {
        match self {
            Error::Json(e) => e.is_syntax() || e.is_data() || e.is_eof(),
            Error::UnexpectedFrame(_) => true,
        }
    }
}
