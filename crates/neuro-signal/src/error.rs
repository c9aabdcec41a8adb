//! Signal pipeline error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Non-finite sample in channel {label} at index {index}")]
    NonFinite { label: String, index: usize },
}

pub type SignalResult<T> = Result<T, SignalError>;
