//! Physical transport seam.
//!
//! The session actor never touches a socket directly. It talks to a
//! [`TransportLink`]: a pair of channels whose other end (the
//! [`TransportPeer`]) is driven by a pump task that owns the socket. Tests
//! substitute their own [`Connector`] and drive the peer by hand.

use crate::error::{WsError, WsResult};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use neuro_core::SessionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Close code reported when the socket fails without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Frames the owner asks the transport to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Send a close frame and stop.
    Close,
}

/// What the transport reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame, not yet parsed.
    Frame(String),
    /// The transport is gone. No further events follow.
    Closed { code: u16, reason: String },
}

/// Owner side of an open transport.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::Sender<Outbound>,
    events: mpsc::Receiver<TransportEvent>,
}

/// Socket side of an open transport.
#[derive(Debug)]
pub struct TransportPeer {
    pub outbound: mpsc::Receiver<Outbound>,
    pub events: mpsc::Sender<TransportEvent>,
}

impl TransportLink {
    /// Create a connected link/peer pair with `buffer` slots in each direction.
    pub fn pair(buffer: usize) -> (TransportLink, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
        (
            TransportLink {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// True while the socket side still accepts frames.
    pub fn is_writable(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a text frame without waiting.
    pub fn try_send_text(&self, text: String) -> WsResult<()> {
        self.outbound
            .try_send(Outbound::Text(text))
            .map_err(|e| match e {
                TrySendError::Full(_) => WsError::SendFailed("outbound buffer full".to_string()),
                TrySendError::Closed(_) => WsError::SendFailed("transport closed".to_string()),
            })
    }

    /// Ask the socket side to close. Best effort.
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
    }

    /// Receive the next transport event. `None` once the peer is dropped.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// Opens transports for a session.
pub trait Connector: Send + Sync {
    fn connect(&self, session: &SessionId) -> BoxFuture<'static, WsResult<TransportLink>>;
}

/// Real WebSocket connector.
///
/// Connects to `{base_url}/ws?sessionId={id}` and spawns a pump task per
/// socket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
    buffer: usize,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>, buffer: usize) -> Self {
        Self {
            base_url: base_url.into(),
            buffer,
        }
    }

    /// Endpoint URL for `session`.
    pub fn endpoint(&self, session: &SessionId) -> String {
        format!(
            "{}/ws?sessionId={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(session.as_str())
        )
    }
}

impl Connector for WsConnector {
    fn connect(&self, session: &SessionId) -> BoxFuture<'static, WsResult<TransportLink>> {
        let url = self.endpoint(session);
        let buffer = self.buffer;
        let session = session.clone();
        async move {
            info!(%url, session = %session, "Connecting to WebSocket");
            let (ws_stream, _response) = connect_async(url.as_str())
                .await
                .map_err(|e| WsError::ConnectionFailed(format!("{url}: {e}")))?;
            let (link, peer) = TransportLink::pair(buffer);
            tokio::spawn(pump(ws_stream, peer, session));
            Ok(link)
        }
        .boxed()
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Move frames between the socket and its peer channels until either side ends.
async fn pump(ws_stream: WsStream, mut peer: TransportPeer, session: SessionId) {
    let (mut write, mut read) = ws_stream.split();

    let (code, reason) = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if peer.events.send(TransportEvent::Frame(text)).await.is_err() {
                            debug!(session = %session, "Transport owner gone");
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break (ABNORMAL_CLOSE, e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(session = %session, code, %reason, "WebSocket closed by server");
                        break (code, reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session = %session, ?e, "WebSocket read error");
                        break (ABNORMAL_CLOSE, e.to_string());
                    }
                    None => {
                        warn!(session = %session, "WebSocket stream ended");
                        break (ABNORMAL_CLOSE, "stream ended".to_string());
                    }
                }
            }

            outbound = peer.outbound.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            warn!(session = %session, ?e, "WebSocket write error");
                            break (ABNORMAL_CLOSE, e.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        debug!(session = %session, "Closing WebSocket");
                        if let Err(e) = write.send(Message::Close(None)).await {
                            debug!(session = %session, ?e, "Failed to send Close frame");
                        }
                        return;
                    }
                }
            }
        }
    };

    let _ = peer
        .events
        .send(TransportEvent::Closed { code, reason })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_session_id() {
        let connector = WsConnector::new("ws://localhost:4000/", 8);
        let session = SessionId::new("lab a/b").unwrap();
        assert_eq!(
            connector.endpoint(&session),
            "ws://localhost:4000/ws?sessionId=lab%20a%2Fb"
        );
    }

    #[tokio::test]
    async fn test_refused_connect_reports_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WsConnector::new(format!("ws://{addr}"), 4);
        let session = SessionId::new("refused").unwrap();
        match connector.connect(&session).await {
            Err(WsError::ConnectionFailed(msg)) => {
                assert!(msg.contains(&format!("{addr}/ws?sessionId=refused")), "{msg}");
            }
            other => panic!("expected ConnectionFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_link_writability_follows_peer() {
        let (link, peer) = TransportLink::pair(4);
        assert!(link.is_writable());
        link.try_send_text("hello".to_string()).unwrap();
        drop(peer);
        assert!(!link.is_writable());
        assert!(link.try_send_text("late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_link_full_buffer_is_send_failure() {
        let (link, _peer) = TransportLink::pair(1);
        link.try_send_text("a".to_string()).unwrap();
        let err = link.try_send_text("b".to_string()).unwrap_err();
        assert!(matches!(err, WsError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_link_receives_peer_events() {
        let (mut link, peer) = TransportLink::pair(4);
        peer.events
            .send(TransportEvent::Frame("{}".to_string()))
            .await
            .unwrap();
        drop(peer);
        assert_eq!(link.recv().await, Some(TransportEvent::Frame("{}".to_string())));
        assert_eq!(link.recv().await, None);
    }
}
