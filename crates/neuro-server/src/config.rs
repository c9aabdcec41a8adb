//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Producer tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Frames buffered per session before slow connections lose the oldest.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Session used when `sessionId` is missing or blank.
    #[serde(default = "default_session")]
    pub default_session: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_outbound_queue_capacity() -> usize {
    32
}

fn default_max_connections() -> usize {
    256
}

fn default_session() -> String {
    neuro_core::DEFAULT_SESSION.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tick_interval_ms: default_tick_interval_ms(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            max_connections: default_max_connections(),
            default_session: default_session(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ServerResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ServerError::Config(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ServerError::Config(
                "outbound_queue_capacity must be positive".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ServerError::Config(
                "max_connections must be positive".to_string(),
            ));
        }
        if self.default_session.trim().is_empty() {
            return Err(ServerError::Config(
                "default_session must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// `host:port` listen address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
