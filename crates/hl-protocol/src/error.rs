//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or validating backend payloads
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A required field was empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Timestamp cannot be represented
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
