//! Integration tests for neurostream.
//!
//! These tests verify the interaction between components over real sockets:
//! - Client multiplexer against a scripted WebSocket server
//! - Client multiplexer against the real stream server

pub mod common;
