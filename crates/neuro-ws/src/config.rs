//! Client connection configuration.

use crate::error::{WsError, WsResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server base URL (e.g. `ws://localhost:4000`). `/ws?sessionId=` is appended.
    #[serde(default = "default_url")]
    pub url: String,
    /// Delay between the first subscriber and the connect attempt.
    #[serde(default = "default_create_debounce_ms")]
    pub create_debounce_ms: u64,
    /// Delay between the last unsubscribe and teardown.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    /// Fixed delay before a reconnect attempt.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Keep-alive interval while the transport is open.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Outbound frame buffer per transport.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_url() -> String {
    "ws://localhost:4000".to_string()
}

fn default_create_debounce_ms() -> u64 {
    50
}

fn default_close_grace_ms() -> u64 {
    500
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

fn default_outbound_buffer() -> usize {
    64
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            create_debounce_ms: default_create_debounce_ms(),
            close_grace_ms: default_close_grace_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl ConnectionConfig {
    /// Validate configuration values.
    ///
    /// The debounce may be zero (connect on the next actor turn); every
    /// other interval and the outbound buffer must be positive.
    pub fn validate(&self) -> WsResult<()> {
        if self.url.trim().is_empty() {
            return Err(WsError::Config("url must not be empty".to_string()));
        }
        let intervals = [
            ("close_grace_ms", self.close_grace_ms),
            ("reconnect_backoff_ms", self.reconnect_backoff_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(WsError::Config(format!("{name} must be positive")));
            }
        }
        if self.outbound_buffer == 0 {
            return Err(WsError::Config("outbound_buffer must be positive".to_string()));
        }
        Ok(())
    }

    pub fn create_debounce(&self) -> Duration {
        Duration::from_millis(self.create_debounce_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.create_debounce_ms, 50);
        assert_eq!(config.close_grace_ms, 500);
        assert_eq!(config.reconnect_backoff_ms, 1000);
        assert_eq!(config.heartbeat_interval_ms, 15_000);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_partial_toml() {
        let config: ConnectionConfig = toml::from_str("url = \"ws://10.0.0.1:4000\"").unwrap();
        assert_eq!(config.url, "ws://10.0.0.1:4000");
        assert_eq!(config.close_grace_ms, 500);
    }

    #[test]
    fn test_zero_backoff_rejected() {
        let config = ConnectionConfig {
            reconnect_backoff_ms: 0,
            ..Default::default()
        };
        assert_err!(config.validate());
    }
}
