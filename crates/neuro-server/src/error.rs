//! Server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] neuro_core::CoreError),

    #[error("Signal error: {0}")]
    Signal(#[from] neuro_signal::SignalError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
