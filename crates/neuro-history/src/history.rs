//! Per-session, per-channel ring buffer store.
//!
//! Single-writer / many-reader: the stream consumer appends, render loops
//! read. Each channel buffer sits behind its own `RwLock`, so a reader never
//! observes a half-updated cursor and can never index out of bounds.

use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use neuro_core::{now_ms, SampleMessage, SessionId};
use parking_lot::RwLock;
use tracing::debug;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::ring::RingBuffer;

type HistoryKey = (SessionId, String);

#[derive(Debug)]
struct ChannelHistory {
    ring: RingBuffer<f64>,
    last_append_ms: i64,
}

/// Store of bounded sample histories keyed by `(session, channel)`.
#[derive(Debug, Clone)]
pub struct RingBufferHistory {
    capacity: NonZeroUsize,
    channels: Arc<DashMap<HistoryKey, Arc<RwLock<ChannelHistory>>>>,
}

impl RingBufferHistory {
    pub fn new(config: &HistoryConfig) -> HistoryResult<Self> {
        let capacity = NonZeroUsize::new(config.capacity()).ok_or_else(|| {
            HistoryError::InvalidCapacity(format!(
                "retention_secs ({}) x sample_rate_hz ({}) must be positive",
                config.retention_secs, config.sample_rate_hz
            ))
        })?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Per-channel capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Append samples for one channel, creating its buffer on first use.
    pub fn append(&self, session: &SessionId, label: &str, values: &[f64]) {
        let entry = self.channel_or_create(session, label);
        let mut channel = entry.write();
        channel.ring.extend_from_slice(values);
        channel.last_append_ms = now_ms();
    }

    /// Append every channel of a SAMPLES frame.
    pub fn append_samples(&self, session: &SessionId, msg: &SampleMessage) {
        for channel in &msg.channels {
            self.append(session, &channel.label, &channel.values);
        }
    }

    /// Buffered samples oldest-first; empty for an unknown key.
    pub fn read_ordered(&self, session: &SessionId, label: &str) -> Vec<f64> {
        self.channel(session, label)
            .map(|c| c.read().ring.read_ordered())
            .unwrap_or_default()
    }

    /// Number of buffered samples for a channel.
    pub fn len(&self, session: &SessionId, label: &str) -> usize {
        self.channel(session, label)
            .map(|c| c.read().ring.len())
            .unwrap_or(0)
    }

    /// Wall-clock time of the last append to a channel (Unix ms).
    pub fn last_append_ms(&self, session: &SessionId, label: &str) -> Option<i64> {
        self.channel(session, label).map(|c| c.read().last_append_ms)
    }

    /// Channel labels with a buffer for `session`, sorted.
    pub fn channels(&self, session: &SessionId) -> Vec<String> {
        let mut labels: Vec<String> = self
            .channels
            .iter()
            .filter(|e| &e.key().0 == session)
            .map(|e| e.key().1.clone())
            .collect();
        labels.sort();
        labels
    }

    fn channel(&self, session: &SessionId, label: &str) -> Option<Arc<RwLock<ChannelHistory>>> {
        self.channels
            .get(&(session.clone(), label.to_string()))
            .map(|e| Arc::clone(e.value()))
    }

    fn channel_or_create(&self, session: &SessionId, label: &str) -> Arc<RwLock<ChannelHistory>> {
        let key = (session.clone(), label.to_string());
        if let Some(existing) = self.channels.get(&key) {
            return Arc::clone(existing.value());
        }
        let capacity = self.capacity;
        let entry = self.channels.entry(key).or_insert_with(|| {
            debug!(
                session_id = %session,
                channel = label,
                capacity = capacity.get(),
                "Creating channel history"
            );
            Arc::new(RwLock::new(ChannelHistory {
                ring: RingBuffer::with_capacity(capacity),
                last_append_ms: 0,
            }))
        });
        Arc::clone(entry.value())
    }
}
