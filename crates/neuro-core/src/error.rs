//! Error types for neuro-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Frame encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Frame decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
