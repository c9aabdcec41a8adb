//! History error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),
}

pub type HistoryResult<T> = Result<T, HistoryError>;
