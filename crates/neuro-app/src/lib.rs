//! neurostream application.
//!
//! Wires the library crates into two commands:
//! - `serve`: the waveform stream server
//! - `watch`: N local subscribers sharing one client transport, feeding a
//!   sample history and logging periodic summaries

pub mod app;
pub mod config;
pub mod error;

pub use app::{serve, ChannelSummary, WatchOptions, WatchSummary, Watcher, RECENT_ANOMALY_LIMIT};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
