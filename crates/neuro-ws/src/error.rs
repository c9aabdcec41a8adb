//! WebSocket client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session actor for {0} is gone")]
    SessionGone(String),

    #[error("Connection manager is shut down")]
    Shutdown,

    #[error("Frame error: {0}")]
    Frame(#[from] neuro_core::CoreError),
}

pub type WsResult<T> = Result<T, WsError>;
