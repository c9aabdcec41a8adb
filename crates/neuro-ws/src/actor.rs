//! Per-session actor.
//!
//! One task owns everything about a session: reference count, timers, the
//! in-flight connect and the open transport. Commands, timer expiries and
//! transport events are handled one at a time, so no state is shared with
//! the public handles except the event bus and a status snapshot.

use crate::config::ConnectionConfig;
use crate::connection::{
    CloseInfo, ConnectionState, SessionEvent, SessionSnapshot, TOPIC_ANOMALY, TOPIC_CLOSE,
    TOPIC_MESSAGE, TOPIC_OPEN, TOPIC_SAMPLES,
};
use crate::error::WsResult;
use crate::event_bus::EventBus;
use crate::heartbeat::Heartbeat;
use crate::timer::{TimerKind, TimerSlots};
use crate::transport::{Connector, TransportEvent, TransportLink, ABNORMAL_CLOSE};
use futures_util::future::BoxFuture;
use neuro_core::{now_ms, SessionId, StreamMessage};
use neuro_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Close code used when the client closes the transport itself.
const NORMAL_CLOSE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Subscribe,
    Unsubscribe,
}

/// State visible to public handles.
pub(crate) struct SessionShared {
    pub(crate) id: SessionId,
    pub(crate) bus: EventBus<SessionEvent>,
    pub(crate) status: RwLock<SessionSnapshot>,
}

impl SessionShared {
    pub(crate) fn new(id: SessionId) -> Self {
        let status = RwLock::new(SessionSnapshot::idle(id.clone()));
        Self {
            id,
            bus: EventBus::new(),
            status,
        }
    }
}

/// Registry entry for a live actor.
#[derive(Clone)]
pub(crate) struct SessionSlot {
    pub(crate) actor_id: u64,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) shared: Arc<SessionShared>,
}

pub(crate) type Registry = Arc<Mutex<HashMap<SessionId, SessionSlot>>>;

type ConnectFuture = BoxFuture<'static, WsResult<TransportLink>>;

enum Step {
    Continue,
    Exit,
}

pub(crate) struct SessionActor {
    actor_id: u64,
    shared: Arc<SessionShared>,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
    timers: TimerSlots,
    ref_count: usize,
    connecting: Option<ConnectFuture>,
    transport: Option<TransportLink>,
    heartbeat: Heartbeat,
    sockets_created: u64,
    last_open_ms: Option<i64>,
}

impl SessionActor {
    pub(crate) fn new(
        actor_id: u64,
        shared: Arc<SessionShared>,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        registry: Registry,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        let heartbeat = Heartbeat::new(config.heartbeat_interval());
        Self {
            actor_id,
            shared,
            config,
            connector,
            registry,
            commands,
            shutdown,
            timers: TimerSlots::new(),
            ref_count: 0,
            connecting: None,
            transport: None,
            heartbeat,
            sockets_created: 0,
            last_open_ms: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(session = %self.shared.id, actor_id = self.actor_id, "Session actor started");

        let reason = loop {
            let step = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.forget();
                    break "shutdown";
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Step::Exit,
                },

                kind = self.timers.next_expired() => self.handle_timer(kind),

                result = next_connect_result(&mut self.connecting) => {
                    self.handle_connect_result(result);
                    Step::Continue
                }

                event = next_transport_event(&mut self.transport) => {
                    self.handle_transport_event(event);
                    Step::Continue
                }
            };

            self.publish_status();
            if let Step::Exit = step {
                break "grace";
            }
        };

        self.teardown(reason);
        debug!(session = %self.shared.id, actor_id = self.actor_id, reason, "Session actor stopped");
    }

    fn handle_command(&mut self, command: Command) -> Step {
        match command {
            Command::Subscribe => {
                self.ref_count += 1;
                if self.timers.cancel(TimerKind::Close) {
                    debug!(session = %self.shared.id, "Pending close cancelled");
                }
                if self.ref_count == 1
                    && self.transport.is_none()
                    && self.connecting.is_none()
                    && !self.timers.is_armed(TimerKind::Reconnect)
                {
                    self.timers
                        .arm(TimerKind::Create, self.config.create_debounce());
                }
                debug!(session = %self.shared.id, ref_count = self.ref_count, "Subscriber added");
            }
            Command::Unsubscribe => {
                if self.ref_count == 0 {
                    warn!(session = %self.shared.id, "Unsubscribe without matching subscribe");
                    return Step::Continue;
                }
                self.ref_count -= 1;
                if self.ref_count == 0 {
                    self.timers.cancel(TimerKind::Create);
                    self.timers.arm(TimerKind::Close, self.config.close_grace());
                    debug!(
                        session = %self.shared.id,
                        grace_ms = self.config.close_grace_ms,
                        "Last subscriber left, close scheduled"
                    );
                } else {
                    debug!(session = %self.shared.id, ref_count = self.ref_count, "Subscriber removed");
                }
            }
        }
        Step::Continue
    }

    fn handle_timer(&mut self, kind: TimerKind) -> Step {
        match kind {
            TimerKind::Create | TimerKind::Reconnect => {
                if self.ref_count == 0 {
                    debug!(session = %self.shared.id, timer = kind.as_str(), "No subscribers, not connecting");
                } else if self.transport.is_none() && self.connecting.is_none() {
                    self.start_connect();
                }
                Step::Continue
            }
            TimerKind::Heartbeat => {
                if let Some(link) = &self.transport {
                    self.heartbeat.beat(link);
                    self.timers
                        .arm(TimerKind::Heartbeat, self.heartbeat.interval());
                }
                Step::Continue
            }
            TimerKind::Close => {
                if self.ref_count > 0 {
                    return Step::Continue;
                }
                self.try_retire()
            }
        }
    }

    /// Leave the registry, unless a subscriber raced in.
    ///
    /// Holding the registry lock while draining the command queue means any
    /// subscribe either lands in the drain or finds the slot gone.
    fn try_retire(&mut self) -> Step {
        let registry = Arc::clone(&self.registry);
        let mut sessions = registry.lock();

        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }
        if self.ref_count > 0 {
            debug!(session = %self.shared.id, "Resubscribed during teardown, keeping transport");
            return Step::Continue;
        }

        if sessions
            .get(&self.shared.id)
            .is_some_and(|slot| slot.actor_id == self.actor_id)
        {
            sessions.remove(&self.shared.id);
        }
        self.commands.close();
        Step::Exit
    }

    /// Drop the registry entry without the drain (shutdown path).
    fn forget(&mut self) {
        let mut sessions = self.registry.lock();
        if sessions
            .get(&self.shared.id)
            .is_some_and(|slot| slot.actor_id == self.actor_id)
        {
            sessions.remove(&self.shared.id);
        }
        self.commands.close();
    }

    fn start_connect(&mut self) {
        self.sockets_created += 1;
        Metrics::client_socket_created();
        info!(
            session = %self.shared.id,
            sockets_created = self.sockets_created,
            "Opening transport"
        );
        self.connecting = Some(self.connector.connect(&self.shared.id));
    }

    fn handle_connect_result(&mut self, result: WsResult<TransportLink>) {
        match result {
            Ok(link) => {
                self.transport = Some(link);
                self.heartbeat.reset();
                self.timers.cancel(TimerKind::Reconnect);
                self.timers
                    .arm(TimerKind::Heartbeat, self.heartbeat.interval());
                let ts = now_ms();
                self.last_open_ms = Some(ts);
                info!(session = %self.shared.id, "Transport open");
                self.shared.bus.publish(TOPIC_OPEN, &SessionEvent::Open { ts });
            }
            Err(e) => {
                warn!(session = %self.shared.id, error = %e, "Transport connect failed");
                Metrics::client_socket_closed("error");
                self.handle_closed(CloseInfo {
                    code: ABNORMAL_CLOSE,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.dispatch_frame(&text),
            TransportEvent::Closed { code, reason } => {
                info!(session = %self.shared.id, code, %reason, "Transport closed by peer");
                Metrics::client_socket_closed("remote");
                self.handle_closed(CloseInfo { code, reason });
            }
        }
    }

    fn dispatch_frame(&self, text: &str) {
        let message = match StreamMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                Metrics::parse_error("client");
                warn!(session = %self.shared.id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        let topic = match message {
            StreamMessage::Samples(_) => TOPIC_SAMPLES,
            StreamMessage::Anomaly(_) => TOPIC_ANOMALY,
        };
        let event = SessionEvent::Message(message);
        self.shared.bus.publish(topic, &event);
        self.shared.bus.publish(TOPIC_MESSAGE, &event);
    }

    fn handle_closed(&mut self, info: CloseInfo) {
        self.transport = None;
        self.timers.cancel(TimerKind::Heartbeat);
        self.shared.bus.publish(TOPIC_CLOSE, &SessionEvent::Close(info));

        if self.ref_count > 0
            && self
                .timers
                .arm_if_idle(TimerKind::Reconnect, self.config.reconnect_backoff())
        {
            Metrics::client_reconnect_scheduled();
            info!(
                session = %self.shared.id,
                backoff_ms = self.config.reconnect_backoff_ms,
                "Reconnect scheduled"
            );
        }
    }

    fn teardown(&mut self, reason: &'static str) {
        self.timers.cancel_all();
        self.connecting = None;
        if let Some(link) = self.transport.take() {
            link.close();
            Metrics::client_socket_closed(reason);
            info!(session = %self.shared.id, reason, "Transport closed");
            self.shared.bus.publish(
                TOPIC_CLOSE,
                &SessionEvent::Close(CloseInfo {
                    code: NORMAL_CLOSE,
                    reason: reason.to_string(),
                }),
            );
        }
        self.ref_count = 0;
        let mut status = self.shared.status.write();
        status.state = ConnectionState::Closed;
        status.ref_count = 0;
        status.sockets_created = self.sockets_created;
    }

    fn state(&self) -> ConnectionState {
        if self.ref_count == 0 && self.timers.is_armed(TimerKind::Close) {
            ConnectionState::PendingClose
        } else if self.transport.is_some() {
            ConnectionState::Open
        } else if self.connecting.is_some() {
            ConnectionState::Connecting
        } else if self.timers.is_armed(TimerKind::Reconnect) {
            ConnectionState::Reconnecting
        } else if self.timers.is_armed(TimerKind::Create) {
            ConnectionState::PendingCreate
        } else {
            ConnectionState::Idle
        }
    }

    fn publish_status(&self) {
        let snapshot = SessionSnapshot {
            session: self.shared.id.clone(),
            state: self.state(),
            ref_count: self.ref_count,
            sockets_created: self.sockets_created,
            last_open_ms: self.last_open_ms,
        };
        *self.shared.status.write() = snapshot;
    }
}

async fn next_connect_result(connecting: &mut Option<ConnectFuture>) -> WsResult<TransportLink> {
    let Some(fut) = connecting.as_mut() else {
        return std::future::pending().await;
    };
    let result = fut.await;
    *connecting = None;
    result
}

async fn next_transport_event(transport: &mut Option<TransportLink>) -> TransportEvent {
    let Some(link) = transport.as_mut() else {
        return std::future::pending().await;
    };
    link.recv().await.unwrap_or_else(|| TransportEvent::Closed {
        code: ABNORMAL_CLOSE,
        reason: "transport dropped".to_string(),
    })
}
