//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use neuro_core::{ClientMessage, SessionId};
use neuro_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::{SessionInfo, SessionRegistry};

/// Caps concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot. The guard releases it on drop.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    registry: SessionRegistry,
    connection_limiter: Arc<ConnectionLimiter>,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(registry: SessionRegistry, config: ServerConfig) -> Self {
        Self {
            registry,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
struct WsParams {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/ws", get(ws_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: "NeuroSignals server running",
    })
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.registry.sessions())
}

async fn metrics() -> Response {
    match Metrics::render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.config.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    let session = SessionId::from_query(params.session_id.as_deref(), &state.config.default_session);
    info!(
        session = %session,
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, session, guard))
}

/// Forward a session's frames to one socket until either side goes away.
async fn handle_ws_connection(
    socket: WebSocket,
    state: AppState,
    session: SessionId,
    _guard: ConnectionGuard,
) {
    Metrics::connection_opened();
    let mut lease = state.registry.attach(session.clone());
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = lease.recv() => {
                match frame {
                    Ok(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            debug!(session = %session, "Failed to send frame, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(session = %session, skipped, "Connection lagged, oldest frames dropped");
                        Metrics::outbound_dropped(skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(session = %session, "Producer stopped");
                        break;
                    }
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_client_frame(&session, text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = %session, "Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(session = %session, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    drop(lease);
    Metrics::connection_closed();
    info!(
        session = %session,
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket connection closed"
    );
}

fn handle_client_frame(session: &SessionId, text: &str) {
    match ClientMessage::decode(text) {
        Ok(ClientMessage::Ping { ts }) => {
            trace!(session = %session, ts, "Keep-alive received");
        }
        Err(e) => {
            Metrics::parse_error("server");
            warn!(session = %session, error = %e, "Ignoring malformed client frame");
        }
    }
}

/// Bind the listen socket described by `config`.
pub async fn bind(config: &ServerConfig) -> ServerResult<TcpListener> {
    let addr = config.bind_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve `state` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    let registry = state.registry.clone();
    let app = create_router(state);
    info!(addr = ?listener.local_addr().ok(), "Starting stream server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    registry.shutdown();
    info!("Stream server stopped");
    Ok(())
}

/// Bind and run the stream server.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> ServerResult<()> {
    state.config.validate()?;
    let listener = bind(&state.config).await?;
    serve(listener, state, shutdown).await
}
