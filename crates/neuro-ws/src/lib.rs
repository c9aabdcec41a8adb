//! Session-scoped WebSocket connection multiplexer.
//!
//! Lets any number of local subscribers share one physical connection per
//! session id:
//! - Debounced creation (near-simultaneous subscribers coalesce)
//! - Reference counting with a grace period before teardown
//! - Fixed-backoff reconnection, at most one attempt per backoff window
//! - Periodic keep-alive frames while the transport is writable
//! - Per-session event bus fanning frames out to subscribers
//!
//! Each session is owned by a single actor task that processes commands,
//! timer expiries and transport events sequentially.

mod actor;
pub mod config;
pub mod connection;
pub mod error;
pub mod event_bus;
pub mod heartbeat;
pub mod timer;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::{
    CloseInfo, ConnectionManager, ConnectionState, SessionEvent, SessionSnapshot, Subscription,
    TOPIC_ANOMALY, TOPIC_CLOSE, TOPIC_MESSAGE, TOPIC_OPEN, TOPIC_SAMPLES,
};
pub use error::{WsError, WsResult};
pub use event_bus::{EventBus, Unsubscribe};
pub use heartbeat::Heartbeat;
pub use timer::{TimerKind, TimerSlots};
pub use transport::{Connector, Outbound, TransportEvent, TransportLink, TransportPeer, WsConnector};
