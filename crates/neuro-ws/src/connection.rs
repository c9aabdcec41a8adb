//! Public face of the multiplexer.
//!
//! [`ConnectionManager::subscribe`] hands out a [`Subscription`] per local
//! consumer. Subscriptions on the same [`SessionId`] share one transport;
//! dropping the last one starts the grace period after which the transport
//! is closed.

use crate::actor::{Command, Registry, SessionActor, SessionShared, SessionSlot};
use crate::config::ConnectionConfig;
use crate::error::{WsError, WsResult};
use crate::event_bus::Unsubscribe;
use crate::transport::{Connector, WsConnector};
use neuro_core::{AnomalyMessage, SampleMessage, SessionId, StreamMessage};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Transport opened.
pub const TOPIC_OPEN: &str = "open";
/// Transport closed (by peer, on failure, or on teardown).
pub const TOPIC_CLOSE: &str = "close";
/// Every valid inbound frame.
pub const TOPIC_MESSAGE: &str = "message";
/// Inbound `SAMPLES` frames.
pub const TOPIC_SAMPLES: &str = "samples";
/// Inbound `ANOMALY` frames.
pub const TOPIC_ANOMALY: &str = "anomaly";

/// Lifecycle state of one session's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No subscribers and nothing scheduled.
    Idle,
    /// Waiting out the creation debounce.
    PendingCreate,
    Connecting,
    Open,
    /// Waiting out the reconnect backoff.
    Reconnecting,
    /// No subscribers; transport kept until the grace period ends.
    PendingClose,
    /// Actor retired. A new subscribe starts a fresh session.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// Payload carried on a session's event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Open { ts: i64 },
    Message(StreamMessage),
    Close(CloseInfo),
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session: SessionId,
    pub state: ConnectionState,
    pub ref_count: usize,
    /// Transports opened (attempted) over the session's lifetime.
    pub sockets_created: u64,
    pub last_open_ms: Option<i64>,
}

impl SessionSnapshot {
    pub(crate) fn idle(session: SessionId) -> Self {
        Self {
            session,
            state: ConnectionState::Idle,
            ref_count: 0,
            sockets_created: 0,
            last_open_ms: None,
        }
    }
}

struct ManagerInner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    registry: Registry,
    next_actor_id: AtomicU64,
    shutdown: CancellationToken,
}

/// Session-scoped connection multiplexer.
///
/// Cheap to clone; clones share sessions.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> WsResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                connector,
                registry: Arc::new(Mutex::new(HashMap::new())),
                next_actor_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Manager backed by real WebSocket transports to `config.url`.
    pub fn with_ws(config: ConnectionConfig) -> WsResult<Self> {
        let connector = Arc::new(WsConnector::new(config.url.clone(), config.outbound_buffer));
        Self::new(config, connector)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Register one subscriber on `session`.
    ///
    /// The first subscriber schedules creation of the transport after the
    /// debounce; later ones share it. Must be called within a Tokio runtime.
    pub fn subscribe(&self, session: SessionId) -> WsResult<Subscription> {
        if self.is_shutdown() {
            return Err(WsError::Shutdown);
        }

        let mut sessions = self.inner.registry.lock();
        let slot = match sessions.get(&session) {
            Some(slot) if !slot.commands.is_closed() => slot.clone(),
            _ => {
                let slot = self.spawn_actor(&session);
                sessions.insert(session.clone(), slot.clone());
                slot
            }
        };
        slot.commands
            .send(Command::Subscribe)
            .map_err(|_| WsError::SessionGone(session.to_string()))?;
        drop(sessions);

        Ok(Subscription {
            session,
            shared: slot.shared,
            commands: slot.commands,
            handles: Vec::new(),
            released: false,
        })
    }

    fn spawn_actor(&self, session: &SessionId) -> SessionSlot {
        let actor_id = self.inner.next_actor_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared::new(session.clone()));
        let actor = SessionActor::new(
            actor_id,
            Arc::clone(&shared),
            self.inner.config.clone(),
            Arc::clone(&self.inner.connector),
            Arc::clone(&self.inner.registry),
            rx,
            self.inner.shutdown.child_token(),
        );
        tokio::spawn(actor.run());
        debug!(session = %session, actor_id, "Session actor spawned");

        SessionSlot {
            actor_id,
            commands: tx,
            shared,
        }
    }

    /// Snapshot of a live session, `None` if it has no actor.
    pub fn snapshot(&self, session: &SessionId) -> Option<SessionSnapshot> {
        self.inner
            .registry
            .lock()
            .get(session)
            .map(|slot| slot.shared.status.read().clone())
    }

    /// Snapshots of all live sessions, ordered by session id.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .inner
            .registry
            .lock()
            .values()
            .map(|slot| slot.shared.status.read().clone())
            .collect();
        snapshots.sort_by(|a, b| a.session.cmp(&b.session));
        snapshots
    }

    /// Close every transport now and refuse further subscriptions.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.inner.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// One consumer's hold on a session.
///
/// Handlers registered through it are removed and the session's reference
/// count is decremented on [`Subscription::unsubscribe`] or drop.
pub struct Subscription {
    session: SessionId,
    shared: Arc<SessionShared>,
    commands: mpsc::UnboundedSender<Command>,
    handles: Vec<Unsubscribe>,
    released: bool,
}

impl Subscription {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.status.read().clone()
    }

    /// Every valid inbound frame.
    pub fn on_message<F>(&mut self, handler: F) -> Unsubscribe
    where
        F: Fn(&StreamMessage) + Send + Sync + 'static,
    {
        self.register(TOPIC_MESSAGE, move |event| {
            if let SessionEvent::Message(message) = event {
                handler(message);
            }
        })
    }

    pub fn on_samples<F>(&mut self, handler: F) -> Unsubscribe
    where
        F: Fn(&SampleMessage) + Send + Sync + 'static,
    {
        self.register(TOPIC_SAMPLES, move |event| {
            if let SessionEvent::Message(StreamMessage::Samples(samples)) = event {
                handler(samples);
            }
        })
    }

    pub fn on_anomaly<F>(&mut self, handler: F) -> Unsubscribe
    where
        F: Fn(&AnomalyMessage) + Send + Sync + 'static,
    {
        self.register(TOPIC_ANOMALY, move |event| {
            if let SessionEvent::Message(StreamMessage::Anomaly(anomaly)) = event {
                handler(anomaly);
            }
        })
    }

    /// Called with the open timestamp (Unix milliseconds).
    pub fn on_open<F>(&mut self, handler: F) -> Unsubscribe
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.register(TOPIC_OPEN, move |event| {
            if let SessionEvent::Open { ts } = event {
                handler(*ts);
            }
        })
    }

    pub fn on_close<F>(&mut self, handler: F) -> Unsubscribe
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        self.register(TOPIC_CLOSE, move |event| {
            if let SessionEvent::Close(info) = event {
                handler(info);
            }
        })
    }

    /// Forward open, close and message events into a channel.
    pub fn channel(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for topic in [TOPIC_OPEN, TOPIC_CLOSE, TOPIC_MESSAGE] {
            let tx = tx.clone();
            self.register(topic, move |event| {
                let _ = tx.send(event.clone());
            });
        }
        rx
    }

    fn register<F>(&mut self, topic: &str, handler: F) -> Unsubscribe
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let handle = self.shared.bus.subscribe(topic, handler);
        self.handles.push(handle.clone());
        handle
    }

    /// Release this subscriber. Equivalent to dropping it.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for handle in self.handles.drain(..) {
            handle.unsubscribe();
        }
        // Actor already retired on shutdown.
        let _ = self.commands.send(Command::Unsubscribe);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session", &self.session)
            .field("handlers", &self.handles.len())
            .field("released", &self.released)
            .finish()
    }
}
