//! Scripted connector for driving the multiplexer without sockets.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use neuro_core::{AnomalyMessage, ChannelSample, SampleMessage, SessionId, StreamMessage};
use neuro_ws::{
    ConnectionConfig, Connector, Outbound, TransportEvent, TransportLink, TransportPeer, WsError,
    WsResult,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connector that hands out in-memory transports and records every attempt.
#[derive(Default)]
pub struct MockConnector {
    attempts: AtomicUsize,
    fail: AtomicBool,
    peers: Mutex<Vec<(SessionId, TransportPeer)>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let connector = Self::default();
        connector.fail.store(true, Ordering::SeqCst);
        Arc::new(connector)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Push a frame into the most recent transport of `session`.
    pub async fn send_frame(&self, session: &SessionId, text: impl Into<String>) {
        let events = self.events_for(session);
        events
            .send(TransportEvent::Frame(text.into()))
            .await
            .expect("transport owner alive");
    }

    /// Close the most recent transport of `session` from the server side.
    pub async fn close_remote(&self, session: &SessionId, code: u16) {
        let events = self.events_for(session);
        events
            .send(TransportEvent::Closed {
                code,
                reason: "server closed".to_string(),
            })
            .await
            .expect("transport owner alive");
    }

    /// Everything written to the most recent transport of `session`.
    pub fn drain_outbound(&self, session: &SessionId) -> Vec<Outbound> {
        let mut peers = self.peers.lock();
        let (_, peer) = peers
            .iter_mut()
            .rev()
            .find(|(id, _)| id == session)
            .expect("transport for session");
        let mut out = Vec::new();
        while let Ok(frame) = peer.outbound.try_recv() {
            out.push(frame);
        }
        out
    }

    fn events_for(&self, session: &SessionId) -> tokio::sync::mpsc::Sender<TransportEvent> {
        self.peers
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == session)
            .map(|(_, peer)| peer.events.clone())
            .expect("transport for session")
    }
}

impl Connector for MockConnector {
    fn connect(&self, session: &SessionId) -> BoxFuture<'static, WsResult<TransportLink>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return async { Err(WsError::ConnectionFailed("connection refused".to_string())) }
                .boxed();
        }
        let (link, peer) = TransportLink::pair(16);
        self.peers.lock().push((session.clone(), peer));
        async move { Ok(link) }.boxed()
    }
}

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        url: "ws://mock".to_string(),
        create_debounce_ms: 50,
        close_grace_ms: 500,
        reconnect_backoff_ms: 1000,
        heartbeat_interval_ms: 15_000,
        outbound_buffer: 16,
    }
}

pub fn session(id: &str) -> SessionId {
    SessionId::new(id).unwrap()
}

pub fn samples_frame(ts: i64) -> String {
    StreamMessage::Samples(SampleMessage {
        ts,
        channels: vec![
            ChannelSample::new("Fp1", vec![0.1, 0.2]),
            ChannelSample::new("Fp2", vec![-0.1, 0.0]),
        ],
    })
    .encode()
    .unwrap()
}

pub fn anomaly_frame(ts: i64, score: f64) -> String {
    StreamMessage::Anomaly(AnomalyMessage {
        ts,
        score,
        max_rms: 1.7,
    })
    .encode()
    .unwrap()
}

/// Advance paused time and let spawned tasks run.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}
