//! neurostream - Entry Point
//!
//! `serve` runs the waveform stream server; `watch` subscribes to a session
//! through the client connection multiplexer.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use neuro_app::{AppConfig, WatchOptions, Watcher};
use neuro_core::SessionId;
use neuro_history::RingBufferHistory;
use neuro_ws::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Synthetic multi-channel waveform streaming
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via NEURO_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the stream server
    Serve,
    /// Subscribe to a session and log summaries until Ctrl-C
    Watch {
        /// Session id (defaults to the server's default session)
        #[arg(short, long)]
        session: Option<String>,
        /// Local subscribers sharing one transport
        #[arg(short = 'n', long, default_value_t = 2)]
        subscribers: usize,
        /// Summary interval in milliseconds
        #[arg(long, default_value_t = 2000)]
        summary_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    neuro_telemetry::init_logging()?;

    info!("Starting neurostream v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > NEURO_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("NEURO_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;
    config.validate()?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    match args.command {
        Command::Serve => {
            neuro_app::serve(&config, shutdown).await?;
        }
        Command::Watch {
            session,
            subscribers,
            summary_interval_ms,
        } => {
            let session =
                SessionId::from_query(session.as_deref(), &config.server.default_session);
            let options = WatchOptions {
                session,
                subscribers,
                summary_interval: Duration::from_millis(summary_interval_ms.max(1)),
            };

            let manager = ConnectionManager::with_ws(config.client.clone())?;
            let history = RingBufferHistory::new(&config.history)?;
            let watcher = Watcher::start(manager, history, &options)?;
            let summary = watcher.run(options.summary_interval, shutdown).await;

            info!(
                session = %options.session,
                messages = ?summary.messages,
                anomalies = summary.recent_anomalies.len(),
                "Watch finished"
            );
        }
    }

    info!("neurostream stopped");
    Ok(())
}
