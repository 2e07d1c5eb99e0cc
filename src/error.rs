//! Error types for cloudfm.

use thiserror::Error;

/// Common error type for cloudfm.
#[derive(Error, Debug)]
pub enum CloudFmError {
    /// The request never produced a response (connection refused, DNS, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error envelope, or the status reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The server accepted the request but reported `success: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// An upload batch is already in flight.
    #[error("an upload is already in progress")]
    Busy,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl CloudFmError {
    /// Short message suitable for a notification line.
    pub fn summary(&self) -> String {
        match self {
            CloudFmError::Status { message, .. } => message.clone(),
            CloudFmError::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for cloudfm operations.
pub type Result<T> = std::result::Result<T, CloudFmError>;
