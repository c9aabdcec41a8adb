//! Core types for the neurostream waveform stream.
//!
//! This crate provides the types shared by the producer (server) and the
//! consumer (client) side:
//! - `SessionId`: Opaque key naming one logical stream
//! - `ChannelSample`, `SampleMessage`, `AnomalyMessage`: Server-to-client frames
//! - `StreamMessage`: `type`-discriminated union of inbound frames
//! - `ClientMessage`: Client-to-server frames (keep-alive)

pub mod error;
pub mod message;
pub mod session;

pub use error::{CoreError, Result};
pub use message::{
    now_ms, AnomalyMessage, ChannelSample, ClientMessage, SampleMessage, StreamMessage,
};
pub use session::{SessionId, DEFAULT_SESSION};
