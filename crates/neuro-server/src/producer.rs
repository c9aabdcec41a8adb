//! Per-session stream producer.
//!
//! On every tick: generate one batch, send it as a `SAMPLES` frame, score it,
//! and send an `ANOMALY` frame after it when the score clears the emission
//! threshold. A tick that fails (non-finite samples, encoding) is skipped as a
//! whole; the next tick proceeds normally.

use std::sync::Arc;
use std::time::Duration;

use neuro_core::{now_ms, AnomalyMessage, ChannelSample, SampleMessage, SessionId, StreamMessage};
use neuro_signal::{ensure_finite, ScoreModel, SignalError, WaveformGenerator};
use neuro_telemetry::Metrics;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{ServerError, ServerResult};

/// What one tick put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Connections that received the SAMPLES frame.
    pub receivers: usize,
    pub anomaly: Option<AnomalyMessage>,
}

pub struct StreamProducer {
    session: SessionId,
    generator: WaveformGenerator,
    model: Arc<dyn ScoreModel>,
    tx: broadcast::Sender<String>,
}

impl StreamProducer {
    pub fn new(
        session: SessionId,
        generator: WaveformGenerator,
        model: Arc<dyn ScoreModel>,
        tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            session,
            generator,
            model,
            tx,
        }
    }

    /// Generate and publish one tick.
    pub fn tick(&self) -> ServerResult<TickReport> {
        self.publish_batch(now_ms(), self.generator.generate())
    }

    /// Publish `channels` as one tick stamped `ts`.
    pub fn publish_batch(&self, ts: i64, channels: Vec<ChannelSample>) -> ServerResult<TickReport> {
        ensure_finite(&channels)?;

        let score = self.model.score(&channels);
        let samples = StreamMessage::Samples(SampleMessage { ts, channels }).encode()?;
        let anomaly = self.model.should_emit(&score).then(|| AnomalyMessage {
            ts,
            score: score.score,
            max_rms: score.max_rms,
        });
        let anomaly_frame = match &anomaly {
            Some(msg) => Some(StreamMessage::Anomaly(msg.clone()).encode()?),
            None => None,
        };

        // No receivers is normal between the last detach and cancellation.
        let receivers = self.tx.send(samples).unwrap_or(0);
        if let (Some(frame), Some(msg)) = (anomaly_frame, &anomaly) {
            let _ = self.tx.send(frame);
            Metrics::anomaly_emitted(msg.score);
            debug!(session = %self.session, score = msg.score, max_rms = msg.max_rms, "Anomaly emitted");
        }
        Metrics::producer_tick();
        trace!(session = %self.session, receivers, "Tick published");

        Ok(TickReport { receivers, anomaly })
    }

    /// Tick at `interval` until `cancel` fires.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        info!(session = %self.session, interval_ms = interval.as_millis() as u64, "Stream producer started");
        Metrics::session_started();

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        Metrics::tick_skipped(skip_reason(&e));
                        warn!(session = %self.session, error = %e, "Tick skipped");
                    }
                }
            }
        }

        Metrics::session_stopped();
        info!(session = %self.session, "Stream producer stopped");
    }
}

fn skip_reason(error: &ServerError) -> &'static str {
    match error {
        ServerError::Signal(SignalError::NonFinite { .. }) => "non_finite",
        ServerError::Frame(_) => "serialize",
        _ => "other",
    }
}
