//! Prometheus metrics for neurostream.
//!
//! Covers:
//! - Server sessions and transport connections
//! - Producer ticks, skipped ticks, anomaly emission
//! - Outbound queue overflow (drop-oldest)
//! - Client socket lifecycle and inbound parse errors
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a startup configuration error. These panics
//! can only happen during lazy static initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_gauge, Counter,
    CounterVec, Encoder, Histogram, IntGauge, TextEncoder,
};

/// Sessions with a running producer.
pub static SERVER_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "neuro_server_sessions",
        "Sessions with a running stream producer"
    )
    .unwrap()
});

/// Open server-side WebSocket connections.
pub static SERVER_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "neuro_server_connections",
        "Open server-side WebSocket connections"
    )
    .unwrap()
});

/// Producer ticks completed.
pub static PRODUCER_TICKS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("neuro_producer_ticks_total", "Producer ticks completed").unwrap()
});

/// Producer ticks skipped.
/// Labels: reason (non_finite/serialize)
pub static PRODUCER_TICKS_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "neuro_producer_ticks_skipped_total",
        "Producer ticks skipped",
        &["reason"]
    )
    .unwrap()
});

/// ANOMALY frames emitted.
pub static ANOMALIES_EMITTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("neuro_anomalies_emitted_total", "ANOMALY frames emitted").unwrap()
});

/// Distribution of emitted anomaly scores.
pub static ANOMALY_SCORE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "neuro_anomaly_score",
        "Emitted anomaly score",
        vec![0.05, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9, 1.0]
    )
    .unwrap()
});

/// Outbound frames dropped on queue overflow.
pub static OUTBOUND_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "neuro_outbound_dropped_total",
        "Outbound frames dropped because a receiver lagged"
    )
    .unwrap()
});

/// Client physical socket creations.
pub static CLIENT_SOCKETS_CREATED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "neuro_client_sockets_created_total",
        "Client transport connect attempts"
    )
    .unwrap()
});

/// Client physical socket closes.
/// Labels: reason (grace/remote/error)
pub static CLIENT_SOCKETS_CLOSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "neuro_client_sockets_closed_total",
        "Client transport closes",
        &["reason"]
    )
    .unwrap()
});

/// Client reconnect attempts scheduled.
pub static CLIENT_RECONNECTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "neuro_client_reconnects_total",
        "Client reconnect attempts scheduled"
    )
    .unwrap()
});

/// Inbound frames dropped as malformed.
pub static PARSE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "neuro_parse_errors_total",
        "Inbound frames dropped as malformed",
        &["side"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a producer starting for a session.
    pub fn session_started() {
        SERVER_SESSIONS.inc();
    }

    /// Record a producer stopping.
    pub fn session_stopped() {
        SERVER_SESSIONS.dec();
    }

    pub fn connection_opened() {
        SERVER_CONNECTIONS.inc();
    }

    pub fn connection_closed() {
        SERVER_CONNECTIONS.dec();
    }

    pub fn producer_tick() {
        PRODUCER_TICKS_TOTAL.inc();
    }

    /// Record a skipped tick.
    pub fn tick_skipped(reason: &str) {
        PRODUCER_TICKS_SKIPPED_TOTAL
            .with_label_values(&[reason])
            .inc();
    }

    /// Record an emitted ANOMALY frame.
    pub fn anomaly_emitted(score: f64) {
        ANOMALIES_EMITTED_TOTAL.inc();
        ANOMALY_SCORE.observe(score);
    }

    /// Record frames lost to outbound overflow.
    pub fn outbound_dropped(count: u64) {
        OUTBOUND_DROPPED_TOTAL.inc_by(count as f64);
    }

    pub fn client_socket_created() {
        CLIENT_SOCKETS_CREATED_TOTAL.inc();
    }

    pub fn client_socket_closed(reason: &str) {
        CLIENT_SOCKETS_CLOSED_TOTAL
            .with_label_values(&[reason])
            .inc();
    }

    pub fn client_reconnect_scheduled() {
        CLIENT_RECONNECTS_TOTAL.inc();
    }

    /// Record a malformed inbound frame (side: client/server).
    pub fn parse_error(side: &str) {
        PARSE_ERRORS_TOTAL.with_label_values(&[side]).inc();
    }

    /// Render the default registry in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
