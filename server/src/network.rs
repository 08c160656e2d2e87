//! Server network layer: HTTP/WebSocket transport and the event loop
//!
//! Every WebSocket connection runs in its own task. Connection tasks decode
//! client frames and forward them to the single server loop, which owns the
//! [`CaptureCoordinator`] and processes one message at a time. Outbound
//! events travel back through per-session queues drained by a writer task
//! per connection.

use crate::config::{CorsOrigin, ServerConfig};
use crate::game::{CaptureCoordinator, CaptureOutcome};
use crate::grid_store::GridStore;
use crate::persistence::{spawn_snapshot_task, SnapshotWriter};
use crate::session_registry::SessionId;
use crate::transport::{outbound_channel, ChannelTransport, Outbound};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientEvent;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// Response body of the liveness endpoint
pub const STATUS_TEXT: &str = "Real-time Grid Server Running";

/// Largest accepted client frame
const MAX_MESSAGE_SIZE: usize = 16 * 1024;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        addr: SocketAddr,
        sender: Outbound,
        reply: oneshot::Sender<SessionId>,
    },
    Event {
        session_id: SessionId,
        event: ClientEvent,
    },
    Disconnected {
        session_id: SessionId,
    },
    Shutdown,
}

/// Server loop owning the authoritative game state
pub struct Server {
    coordinator: CaptureCoordinator<ChannelTransport>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub fn new(
        coordinator: CaptureCoordinator<ChannelTransport>,
        server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> Self {
        Self {
            coordinator,
            server_rx,
        }
    }

    /// Processes messages until shutdown or until every sender is gone
    pub async fn run(mut self) {
        while let Some(message) = self.server_rx.recv().await {
            if matches!(message, ServerMessage::Shutdown) {
                info!("Server loop shutting down");
                break;
            }
            self.handle_message(message);
        }

        info!(
            "Server loop stopped with {} sessions ({} joined), {} cells claimed",
            self.coordinator.sessions().len(),
            self.coordinator.sessions().joined_count(),
            self.coordinator.grid().claimed_count()
        );
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => {
                let session_id = self.coordinator.handle_connect(addr);
                self.coordinator.transport_mut().attach(session_id, sender);
                if reply.send(session_id).is_err() {
                    // Connection task went away before learning its id
                    self.coordinator.handle_disconnect(session_id);
                }
            }
            ServerMessage::Event {
                session_id,
                event: ClientEvent::Join { username, color },
            } => {
                self.coordinator.handle_join(session_id, username, color);
            }
            ServerMessage::Event {
                session_id,
                event: ClientEvent::Capture { cell_id },
            } => {
                let outcome = self.coordinator.handle_capture(session_id, cell_id);
                if outcome == CaptureOutcome::Captured {
                    debug!(
                        "{} of {} cells claimed",
                        self.coordinator.grid().claimed_count(),
                        self.coordinator.grid().len()
                    );
                }
            }
            ServerMessage::Disconnected { session_id } => {
                self.coordinator.handle_disconnect(session_id);
            }
            ServerMessage::Shutdown => {}
        }
    }
}

#[derive(Clone)]
struct AppState {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    cors_origin: CorsOrigin,
}

fn build_router(state: AppState) -> Router {
    let cors = state.cors_origin.layer();
    Router::new()
        .route("/", get(status))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(cors)
}

async fn status() -> &'static str {
    STATUS_TEXT
}

async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.cors_origin.allows(headers.get(header::ORIGIN)) {
        warn!("Refusing WebSocket upgrade from {} with foreign origin", addr);
        return (StatusCode::FORBIDDEN, "forbidden").into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, addr, state.server_tx))
}

async fn handle_socket(
    socket: WebSocket,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let (mut ws_tx, ws_rx) = socket.split();
    let (out_tx, mut out_rx) = outbound_channel();
    let (reply_tx, reply_rx) = oneshot::channel();

    let connected = ServerMessage::Connected {
        addr,
        sender: out_tx,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        return;
    }
    let Ok(session_id) = reply_rx.await else {
        return;
    };

    // Forward queued server events to the socket. The queue closes when the
    // transport detaches the session, which ends the connection.
    let mut writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    tokio::select! {
        _ = read_frames(ws_rx, session_id, &server_tx) => {}
        _ = &mut writer => debug!("Outbound queue of session {} closed", session_id),
    }

    let _ = server_tx.send(ServerMessage::Disconnected { session_id });
    writer.abort();
}

/// Decodes client frames and forwards them until the socket closes
async fn read_frames(
    mut ws_rx: SplitStream<WebSocket>,
    session_id: SessionId,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientEvent::decode(text.as_str()) {
                Ok(event) => {
                    if server_tx
                        .send(ServerMessage::Event { session_id, event })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => debug!("Dropping frame from session {}: {}", session_id, e),
            },
            Ok(Message::Binary(_)) => {
                debug!("Dropping binary frame from session {}", session_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error on session {}: {}", session_id, e);
                break;
            }
        }
    }
}

/// Binds to the configured address and serves until `shutdown` resolves
pub async fn serve(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Server listening on {}", listener.local_addr()?);
    serve_listener(listener, config, shutdown).await?;
    Ok(())
}

/// Serves on an already bound listener.
///
/// Loads the grid, starts the server loop and the snapshot writer, and runs
/// the HTTP server until `shutdown` resolves. On return the server loop has
/// stopped and the latest grid has been flushed to disk.
pub async fn serve_listener(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<SocketAddr, BoxError> {
    let addr = listener.local_addr()?;

    let grid = GridStore::load(&config.state_path, config.grid_size);
    if grid.is_empty() {
        return Err("grid size must be at least 1".into());
    }
    let (snapshots, snapshot_rx) = SnapshotWriter::channel();
    let snapshot_task = spawn_snapshot_task(config.state_path.clone(), snapshot_rx);

    let (server_tx, server_rx) = mpsc::unbounded_channel();
    let coordinator = CaptureCoordinator::new(grid, ChannelTransport::new(), snapshots);
    let server_loop = tokio::spawn(Server::new(coordinator, server_rx).run());

    let app = build_router(AppState {
        server_tx: server_tx.clone(),
        cors_origin: config.cors_origin.clone(),
    });

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    if let Err(e) = &result {
        error!("HTTP server error: {}", e);
    }

    let _ = server_tx.send(ServerMessage::Shutdown);
    if let Err(e) = server_loop.await {
        error!("Server loop task panicked: {}", e);
    }
    if let Err(e) = snapshot_task.await {
        error!("Snapshot task panicked: {}", e);
    }

    result?;
    Ok(addr)
}
