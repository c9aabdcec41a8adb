//! Bounded sample history for visual continuity.
//!
//! Keeps the last N seconds of samples per `(session, channel)` so a
//! renderer can redraw a continuous trace across re-renders and transient
//! disconnects. Buffers are created lazily on first append and are never torn
//! down; memory is bounded by capacity, not by session lifetime.

pub mod config;
pub mod error;
pub mod history;
pub mod ring;

pub use config::HistoryConfig;
pub use error::{HistoryError, HistoryResult};
pub use history::RingBufferHistory;
pub use ring::RingBuffer;
