//! Application wiring for the `serve` and `watch` commands.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use neuro_core::{AnomalyMessage, ChannelSample, SampleMessage, SessionId};
use neuro_history::RingBufferHistory;
use neuro_server::{run_server, AppState, SessionRegistry};
use neuro_signal::{AnomalyScorer, WaveformGenerator};
use neuro_ws::{ConnectionManager, SessionSnapshot, Subscription};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Anomalies retained per view.
pub const RECENT_ANOMALY_LIMIT: usize = 50;

/// Run the stream server until `shutdown` fires.
pub async fn serve(config: &AppConfig, shutdown: CancellationToken) -> AppResult<()> {
    let generator = WaveformGenerator::new(config.generator.clone())?;
    let scorer = AnomalyScorer::new(config.scorer.clone())?;
    let registry = SessionRegistry::new(config.server.clone(), generator, Arc::new(scorer));
    let state = AppState::new(registry, config.server.clone());

    info!(
        addr = %config.server.bind_addr(),
        tick_interval_ms = config.server.tick_interval_ms,
        "Serving waveform streams"
    );
    run_server(state, shutdown).await?;
    Ok(())
}

/// Options for the `watch` command.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub session: SessionId,
    /// Local subscribers sharing the session's transport.
    pub subscribers: usize,
    pub summary_interval: Duration,
}

/// What one local subscriber has seen.
#[derive(Debug, Default)]
struct ViewState {
    latest: Option<SampleMessage>,
    anomalies: VecDeque<AnomalyMessage>,
}

#[derive(Default)]
struct StreamView {
    state: Mutex<ViewState>,
    messages: AtomicU64,
}

impl StreamView {
    fn record_samples(&self, samples: &SampleMessage) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.state.lock().latest = Some(samples.clone());
    }

    fn record_anomaly(&self, anomaly: &AnomalyMessage) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.anomalies.len() == RECENT_ANOMALY_LIMIT {
            state.anomalies.pop_front();
        }
        state.anomalies.push_back(anomaly.clone());
    }
}

/// Per-channel line of a watch summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub label: String,
    /// Samples held in history.
    pub buffered: usize,
    /// RMS of the most recent batch.
    pub last_rms: f64,
}

#[derive(Debug, Clone)]
pub struct WatchSummary {
    pub snapshot: Option<SessionSnapshot>,
    pub channels: Vec<ChannelSummary>,
    /// Messages received by each subscriber.
    pub messages: Vec<u64>,
    /// Anomalies retained by the first subscriber, oldest first.
    pub recent_anomalies: Vec<AnomalyMessage>,
}

/// N local subscribers on one session.
///
/// The first subscriber feeds the sample history, mirroring a renderer;
/// every subscriber keeps its own latest batch and recent anomalies.
pub struct Watcher {
    session: SessionId,
    manager: ConnectionManager,
    history: RingBufferHistory,
    views: Vec<Arc<StreamView>>,
    subscriptions: Vec<Subscription>,
}

impl Watcher {
    pub fn start(
        manager: ConnectionManager,
        history: RingBufferHistory,
        options: &WatchOptions,
    ) -> AppResult<Self> {
        let count = options.subscribers.max(1);
        let mut views = Vec::with_capacity(count);
        let mut subscriptions = Vec::with_capacity(count);

        for index in 0..count {
            let view = Arc::new(StreamView::default());
            let mut subscription = manager.subscribe(options.session.clone())?;

            let samples_view = Arc::clone(&view);
            let feed = (index == 0).then(|| (history.clone(), options.session.clone()));
            subscription.on_samples(move |samples| {
                samples_view.record_samples(samples);
                if let Some((history, session)) = &feed {
                    history.append_samples(session, samples);
                }
            });

            let anomaly_view = Arc::clone(&view);
            let session = options.session.clone();
            subscription.on_anomaly(move |anomaly| {
                anomaly_view.record_anomaly(anomaly);
                if index == 0 {
                    warn!(session = %session, score = anomaly.score, max_rms = anomaly.max_rms, "Anomaly");
                }
            });

            let session = options.session.clone();
            subscription.on_open(move |ts| {
                debug!(session = %session, subscriber = index, ts, "Session open");
            });
            let session = options.session.clone();
            subscription.on_close(move |close| {
                debug!(session = %session, subscriber = index, code = close.code, reason = %close.reason, "Session close");
            });

            views.push(view);
            subscriptions.push(subscription);
        }

        info!(session = %options.session, subscribers = count, "Watching session");
        Ok(Self {
            session: options.session.clone(),
            manager,
            history,
            views,
            subscriptions,
        })
    }

    pub fn summary(&self) -> WatchSummary {
        let latest = self.views.first().and_then(|v| v.state.lock().latest.clone());
        let channels = self
            .history
            .channels(&self.session)
            .into_iter()
            .map(|label| {
                let last_rms = latest
                    .as_ref()
                    .and_then(|batch| batch.channels.iter().find(|c| c.label == label))
                    .map(ChannelSample::rms)
                    .unwrap_or(0.0);
                ChannelSummary {
                    buffered: self.history.len(&self.session, &label),
                    label,
                    last_rms,
                }
            })
            .collect();

        WatchSummary {
            snapshot: self.manager.snapshot(&self.session),
            channels,
            messages: self
                .views
                .iter()
                .map(|v| v.messages.load(Ordering::Relaxed))
                .collect(),
            recent_anomalies: self
                .views
                .first()
                .map(|v| v.state.lock().anomalies.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Log a summary every `interval` until `shutdown` fires, then release
    /// all subscribers and stop the manager.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) -> WatchSummary {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => log_summary(&self.session, &self.summary()),
            }
        }

        let summary = self.summary();
        self.stop();
        summary
    }

    /// Release every subscriber and shut the manager down.
    pub fn stop(self) {
        let Self {
            manager,
            subscriptions,
            ..
        } = self;
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        manager.shutdown();
    }
}

fn log_summary(session: &SessionId, summary: &WatchSummary) {
    let state = summary
        .snapshot
        .as_ref()
        .map(|s| format!("{:?}", s.state))
        .unwrap_or_else(|| "Gone".to_string());
    info!(
        session = %session,
        state = %state,
        messages = ?summary.messages,
        anomalies = summary.recent_anomalies.len(),
        "Watch summary"
    );
    for channel in &summary.channels {
        info!(
            session = %session,
            channel = %channel.label,
            buffered = channel.buffered,
            last_rms = %format!("{:.3}", channel.last_rms),
            "Channel"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly(ts: i64) -> AnomalyMessage {
        AnomalyMessage {
            ts,
            score: 0.3,
            max_rms: 2.2,
        }
    }

    #[test]
    fn test_view_keeps_last_fifty_anomalies() {
        let view = StreamView::default();
        for ts in 0..(RECENT_ANOMALY_LIMIT as i64 + 10) {
            view.record_anomaly(&anomaly(ts));
        }

        let state = view.state.lock();
        assert_eq!(state.anomalies.len(), RECENT_ANOMALY_LIMIT);
        assert_eq!(state.anomalies.front().map(|a| a.ts), Some(10));
        assert_eq!(
            state.anomalies.back().map(|a| a.ts),
            Some(RECENT_ANOMALY_LIMIT as i64 + 9)
        );
        assert_eq!(view.messages.load(Ordering::Relaxed), 60);
    }

    #[test]
    fn test_view_tracks_latest_batch() {
        let view = StreamView::default();
        for ts in [1, 2, 3] {
            view.record_samples(&SampleMessage {
                ts,
                channels: vec![ChannelSample::new("Fp1", vec![1.0])],
            });
        }
        assert_eq!(view.state.lock().latest.as_ref().map(|s| s.ts), Some(3));
    }
}
