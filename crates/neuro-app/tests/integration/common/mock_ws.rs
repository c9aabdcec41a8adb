//! Mock WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections and record their request URIs
//! - Record received text frames
//! - Push frames to, or close, every live connection

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

enum ServerCommand {
    Text(String),
    Close,
}

#[derive(Default)]
struct Shared {
    uris: Vec<String>,
    messages: Vec<String>,
    live: Vec<mpsc::UnboundedSender<ServerCommand>>,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    shared: Arc<Mutex<Shared>>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let shared_clone = shared.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, shared_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            shared,
        }
    }

    /// Base URL to hand to the client (`/ws?sessionId=` is appended by it).
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of completed handshakes.
    pub async fn connection_count(&self) -> usize {
        self.shared.lock().await.uris.len()
    }

    /// Request URIs of every handshake, in order.
    pub async fn uris(&self) -> Vec<String> {
        self.shared.lock().await.uris.clone()
    }

    /// All text frames received from clients.
    pub async fn received_messages(&self) -> Vec<String> {
        self.shared.lock().await.messages.clone()
    }

    /// Send `text` to every live connection.
    pub async fn broadcast(&self, text: &str) {
        let shared = self.shared.lock().await;
        for tx in &shared.live {
            let _ = tx.send(ServerCommand::Text(text.to_string()));
        }
    }

    /// Close every live connection from the server side.
    pub async fn close_all(&self) {
        let mut shared = self.shared.lock().await;
        for tx in shared.live.drain(..) {
            let _ = tx.send(ServerCommand::Close);
        }
    }

    /// Number of connections still open.
    pub async fn live_count(&self) -> usize {
        self.shared
            .lock()
            .await
            .live
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, shared: Arc<Mutex<Shared>>) {
    let uri = Arc::new(std::sync::Mutex::new(String::new()));
    let uri_clone = uri.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Ok(mut slot) = uri_clone.lock() {
            *slot = request.uri().to_string();
        }
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    {
        let mut shared = shared.lock().await;
        let uri = uri.lock().map(|u| u.clone()).unwrap_or_default();
        shared.uris.push(uri);
        shared.live.push(cmd_tx);
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        shared.lock().await.messages.push(text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ServerCommand::Text(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(ServerCommand::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
