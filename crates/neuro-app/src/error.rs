//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(#[from] neuro_server::ServerError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] neuro_ws::WsError),

    #[error("Signal error: {0}")]
    Signal(#[from] neuro_signal::SignalError),

    #[error("History error: {0}")]
    History(#[from] neuro_history::HistoryError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] neuro_telemetry::TelemetryError),

    #[error("Invalid session id: {0}")]
    Session(#[from] neuro_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
