//! Session registry.
//!
//! All connections bound to one session id share a single producer. The
//! first attach starts it; the last detach stops it. Frames fan out through
//! a bounded broadcast channel, so a connection that falls behind loses its
//! oldest frames while the others are unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use neuro_core::{now_ms, SessionId};
use neuro_signal::{ScoreModel, WaveformGenerator};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::producer::StreamProducer;

struct SessionEntry {
    tx: broadcast::Sender<String>,
    connections: usize,
    cancel: CancellationToken,
    started_ms: i64,
}

/// Live session as reported by `/api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub connections: usize,
    pub started_ms: i64,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    generator: WaveformGenerator,
    model: Arc<dyn ScoreModel>,
    config: Arc<ServerConfig>,
}

impl SessionRegistry {
    pub fn new(
        config: ServerConfig,
        generator: WaveformGenerator,
        model: Arc<dyn ScoreModel>,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            generator,
            model,
            config: Arc::new(config),
        }
    }

    /// Bind one connection to `session`, starting its producer if needed.
    ///
    /// Must be called within a Tokio runtime.
    pub fn attach(&self, session: SessionId) -> SessionLease {
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(session.clone()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.config.outbound_queue_capacity);
            let cancel = CancellationToken::new();
            let producer = StreamProducer::new(
                session.clone(),
                self.generator.clone(),
                Arc::clone(&self.model),
                tx.clone(),
            );
            tokio::spawn(producer.run(self.config.tick_interval(), cancel.clone()));
            SessionEntry {
                tx,
                connections: 0,
                cancel,
                started_ms: now_ms(),
            }
        });
        entry.connections += 1;
        let frames = entry.tx.subscribe();
        debug!(session = %session, connections = entry.connections, "Connection attached");

        SessionLease {
            session,
            frames,
            registry: self.clone(),
        }
    }

    fn detach(&self, session: &SessionId) {
        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(session) else {
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        debug!(session = %session, connections = entry.connections, "Connection detached");
        if entry.connections == 0 {
            if let Some(entry) = sessions.remove(session) {
                entry.cancel.cancel();
                info!(session = %session, "Last connection left, stopping producer");
            }
        }
    }

    /// Live sessions ordered by id.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, entry)| SessionInfo {
                session_id: id.clone(),
                connections: entry.connections,
                started_ms: entry.started_ms,
            })
            .collect();
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Stop every producer. Leases still held detach as a no-op.
    pub fn shutdown(&self) {
        let mut sessions = self.sessions.lock();
        for (session, entry) in sessions.drain() {
            entry.cancel.cancel();
            debug!(session = %session, "Producer cancelled on shutdown");
        }
    }
}

/// One connection's binding to a session. Detaches on drop.
pub struct SessionLease {
    session: SessionId,
    frames: broadcast::Receiver<String>,
    registry: SessionRegistry,
}

impl SessionLease {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Next encoded frame for this connection.
    pub async fn recv(&mut self) -> Result<String, broadcast::error::RecvError> {
        self.frames.recv().await
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.registry.detach(&self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuro_core::StreamMessage;
    use neuro_signal::{AnomalyScorer, GeneratorConfig, ScorerConfig};
    use std::time::Duration;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            ServerConfig::default(),
            WaveformGenerator::new(GeneratorConfig::default()).unwrap(),
            Arc::new(AnomalyScorer::new(ScorerConfig::default()).unwrap()),
        )
    }

    fn id(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_share_one_producer() {
        let registry = registry();
        let mut a = registry.attach(id("lab"));
        let mut b = registry.attach(id("lab"));
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.sessions()[0].connections, 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let frame_a = a.recv().await.unwrap();
        let frame_b = b.recv().await.unwrap();
        assert_eq!(frame_a, frame_b);
        assert_eq!(StreamMessage::decode(&frame_a).unwrap().kind(), "SAMPLES");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let registry = registry();
        let _a = registry.attach(id("alpha"));
        let _b = registry.attach(id("beta"));

        let infos = registry.sessions();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].session_id.as_str(), "alpha");
        assert_eq!(infos[1].session_id.as_str(), "beta");
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_detach_stops_producer() {
        let registry = registry();
        let a = registry.attach(id("lab"));
        let b = registry.attach(id("lab"));

        drop(a);
        assert_eq!(registry.session_count(), 1);
        drop(b);
        assert_eq!(registry.session_count(), 0);

        // A fresh attach starts a new producer.
        let mut c = registry.attach(id("lab"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(c.recv().await.is_ok());
        assert_eq!(registry.sessions()[0].connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_producers() {
        let registry = registry();
        let mut lease = registry.attach(id("lab"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(lease.recv().await.is_ok());

        registry.shutdown();
        assert_eq!(registry.session_count(), 0);
        tokio::time::sleep(Duration::from_millis(500)).await;

        // Producer gone: buffered frames drain, then the channel reports closed.
        let mut closed = false;
        for _ in 0..64 {
            if let Err(broadcast::error::RecvError::Closed) = lease.recv().await {
                closed = true;
                break;
            }
        }
        assert!(closed);
        drop(lease);
    }
}
