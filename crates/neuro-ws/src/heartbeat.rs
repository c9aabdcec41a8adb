//! Keep-alive for open transports.
//!
//! The session actor arms the heartbeat timer when a transport opens and
//! calls [`Heartbeat::beat`] on every expiry. A PING is only written while the
//! transport is writable; otherwise the beat is a no-op.

use crate::transport::TransportLink;
use neuro_core::{now_ms, ClientMessage};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    pings_sent: u64,
    last_ping_ms: Option<i64>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pings_sent: 0,
            last_ping_ms: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reset on a new transport.
    pub fn reset(&mut self) {
        self.last_ping_ms = None;
    }

    /// Send one PING if the transport accepts it. Returns whether it was queued.
    pub fn beat(&mut self, link: &TransportLink) -> bool {
        if !link.is_writable() {
            debug!("Transport not writable, skipping heartbeat");
            return false;
        }

        let text = match ClientMessage::ping().encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(?e, "Failed to encode heartbeat");
                return false;
            }
        };

        match link.try_send_text(text) {
            Ok(()) => {
                self.pings_sent += 1;
                self.last_ping_ms = Some(now_ms());
                debug!(pings_sent = self.pings_sent, "Sent heartbeat ping");
                true
            }
            Err(e) => {
                debug!(?e, "Heartbeat not queued");
                false
            }
        }
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }

    pub fn last_ping_ms(&self) -> Option<i64> {
        self.last_ping_ms
    }
}
