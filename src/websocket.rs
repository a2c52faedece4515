//! WebSocket handler: subscriber connections and channel attachment.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::{ChannelRegistry, Subscriber};
use crate::config::ServerConfig;

/// Frames a slow subscriber may have queued before writes start timing out.
const FRAME_QUEUE: usize = 4;

/// Keepalive ping interval.
const WS_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Server state shared across connections
pub struct AppState {
    pub registry: ChannelRegistry,
    pub config: ServerConfig,
    /// Current total connection count (for enforcing max_connections)
    connection_count: AtomicUsize,
}

impl AppState {
    pub fn new(registry: ChannelRegistry, config: ServerConfig) -> Self {
        Self {
            registry,
            config,
            connection_count: AtomicUsize::new(0),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Try to acquire a connection slot. Returns false when full (0 = unlimited).
    fn try_acquire_connection(&self) -> bool {
        let max = self.config.max_connections;
        if max > 0 && self.connection_count.load(Ordering::Relaxed) >= max {
            return false;
        }
        self.connection_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn release_connection(&self) {
        self.connection_count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Channel id from the request path.
///
/// An absolute URI yields its path component including the leading `/`;
/// anything else is taken verbatim with a single leading `/` stripped.
/// The asymmetry is part of the wire contract.
pub fn channel_id_from_path(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.strip_prefix('/').unwrap_or(raw).to_string(),
    }
}

/// Handle WebSocket upgrade — enforces the connection limit before accepting
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    if !state.try_acquire_connection() {
        warn!("Connection rejected for {}: limit exceeded", addr);
        return axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, addr, channel))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr, raw_path: String) {
    let channel_id = channel_id_from_path(&raw_path);
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(FRAME_QUEUE);
    let connected = Arc::new(AtomicBool::new(true));

    info!(peer = %addr, channel = %channel_id, "new subscriber");
    state.registry.subscribe(
        &channel_id,
        Subscriber::new(addr.to_string(), tx, Arc::clone(&connected)),
    );

    // Forward queued frames as binary messages and keep the socket alive
    // with periodic pings.
    let forward_connected = Arc::clone(&connected);
    let forward_task = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(WS_PING_INTERVAL);
        ping_ticker.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let started = Instant::now();
                            let bytes = frame.len();
                            if ws_sender.send(Message::Binary(frame)).await.is_err() {
                                break;
                            }
                            debug!(bytes, elapsed = ?started.elapsed(), "sent frame");
                        }
                        None => break,
                    }
                }
                _ = ping_ticker.tick() => {
                    if ws_sender.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                }
            }
        }
        forward_connected.store(false, Ordering::Relaxed);
    });

    // Subscribers only listen; drain inbound traffic until close or error.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => { /* ignore inbound frames */ }
            Err(e) => {
                debug!(peer = %addr, error = %e, "websocket error");
                break;
            }
        }
    }

    connected.store(false, Ordering::Relaxed);
    state.release_connection();
    forward_task.abort();
    info!(peer = %addr, channel = %channel_id, "subscriber disconnected");
}
