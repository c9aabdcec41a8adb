//! neuro-server - Synthetic waveform stream server.
//!
//! Serves per-session streams of `SAMPLES` and `ANOMALY` frames over
//! WebSocket. Connections that name the same session share one producer.
//!
//! # Routes
//!
//! ```text
//! GET /                    → {"status":"ok", ...}
//! GET /ws?sessionId=<id>   → WebSocket upgrade (missing id → default session)
//! GET /api/sessions        → live sessions with connection counts
//! GET /metrics             → Prometheus text
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use neuro_server::{run_server, AppState, ServerConfig, SessionRegistry};
//!
//! let registry = SessionRegistry::new(config.clone(), generator, Arc::new(scorer));
//! let state = AppState::new(registry, config);
//! run_server(state, shutdown_token).await?;
//! ```

pub mod config;
pub mod error;
pub mod producer;
pub mod registry;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use producer::{StreamProducer, TickReport};
pub use registry::{SessionInfo, SessionLease, SessionRegistry};
pub use server::{
    bind, create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter,
};
