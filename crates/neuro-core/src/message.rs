//! Stream frame types.
//!
//! All frames are JSON objects discriminated by a `type` field:
//! - `SAMPLES` (server → client): one batch of multi-channel samples per tick
//! - `ANOMALY` (server → client): emitted only when the anomaly score is
//!   above the emission threshold
//! - `PING` (client → server): keep-alive

use crate::error::{CoreError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Samples of one channel captured at the same logical timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    /// Channel label (e.g. "Fp1"). Stable for the lifetime of a session.
    pub label: String,
    /// Samples in capture order.
    pub values: Vec<f64>,
}

impl ChannelSample {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// Root-mean-square of the values, `0.0` for an empty channel.
    pub fn rms(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.values.iter().map(|v| v * v).sum();
        (sum_sq / self.values.len() as f64).sqrt()
    }

    /// True when no value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// One producer tick worth of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMessage {
    /// Capture time (Unix milliseconds).
    pub ts: i64,
    pub channels: Vec<ChannelSample>,
}

/// Anomaly notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyMessage {
    /// Detection time (Unix milliseconds).
    pub ts: i64,
    /// Normalized score in `[0, 1]`.
    pub score: f64,
    /// Largest per-channel RMS of the scored batch.
    #[serde(rename = "maxRms", default)]
    pub max_rms: f64,
}

/// Server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamMessage {
    #[serde(rename = "SAMPLES")]
    Samples(SampleMessage),
    #[serde(rename = "ANOMALY")]
    Anomaly(AnomalyMessage),
}

impl StreamMessage {
    /// Frame timestamp (Unix milliseconds).
    pub fn ts(&self) -> i64 {
        match self {
            Self::Samples(m) => m.ts,
            Self::Anomaly(m) => m.ts,
        }
    }

    /// Wire discriminator of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Samples(_) => "SAMPLES",
            Self::Anomaly(_) => "ANOMALY",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(CoreError::Encode)
    }

    /// Parse a JSON text frame.
    ///
    /// Unknown `type` values and missing fields are decode errors.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(CoreError::Decode)
    }
}

impl From<SampleMessage> for StreamMessage {
    fn from(msg: SampleMessage) -> Self {
        Self::Samples(msg)
    }
}

impl From<AnomalyMessage> for StreamMessage {
    fn from(msg: AnomalyMessage) -> Self {
        Self::Anomaly(msg)
    }
}

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Keep-alive.
    #[serde(rename = "PING")]
    Ping { ts: i64 },
}

impl ClientMessage {
    pub fn ping() -> Self {
        Self::Ping { ts: now_ms() }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(CoreError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(CoreError::Decode)
    }
}
