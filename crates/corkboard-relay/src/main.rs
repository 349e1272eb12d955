//! Corkboard WebSocket Relay Server
//!
//! Fans out row changes between clients on the same board and keeps the
//! latest row per id so new joiners start from the current board.
//!
//! See [`protocol`] for the message format.

mod protocol;
mod state;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use corkboard_core::BoardId;
use futures_util::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use protocol::{ClientMessage, ServerMessage};
use state::{RelayError, RelayState};

/// Environment variable holding the listen address.
const ADDR_ENV: &str = "CORKBOARD_RELAY_ADDR";
const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3030);

/// Resolve the listen address, falling back to the default on a bad value.
fn listen_addr(value: Option<String>) -> SocketAddr {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring {}={:?}: {}", ADDR_ENV, raw, e);
            SocketAddr::from(DEFAULT_ADDR)
        }),
        None => SocketAddr::from(DEFAULT_ADDR),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corkboard_relay=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(RelayState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = listen_addr(std::env::var(ADDR_ENV).ok());
    info!("Corkboard relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// Index page
async fn index() -> &'static str {
    "Corkboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize a server message into a text frame.
fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Could not encode {:?}: {}", msg, e);
            None
        }
    }
}

/// Leave a board and tell the peers that stay.
fn leave(state: &RelayState, board: BoardId, peer_id: &str) {
    state.broadcast(
        board,
        peer_id,
        ServerMessage::PeerLeft {
            peer_id: peer_id.to_string(),
        },
    );
    state.leave(board, peer_id);
    info!("Peer {} left board {}", peer_id, board);
}

/// Handle one client message. Returns the reply for the sender, if any.
fn handle_message(
    state: &RelayState,
    peer_id: &str,
    msg: ClientMessage,
    current_board: &mut Option<BoardId>,
    board_rx: &mut Option<broadcast::Receiver<(String, ServerMessage)>>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join { board } => {
            if let Some(old) = current_board.take() {
                leave(state, old, peer_id);
            }
            let (rx, snapshot, peer_count) = state.join(board, peer_id);
            *board_rx = Some(rx);
            *current_board = Some(board);
            state.broadcast(
                board,
                peer_id,
                ServerMessage::PeerJoined {
                    peer_id: peer_id.to_string(),
                },
            );
            info!("Peer {} joined board {} ({} peers)", peer_id, board, peer_count);
            Some(ServerMessage::Joined { board, peer_count, snapshot })
        }
        ClientMessage::Leave => {
            if let Some(board) = current_board.take() {
                leave(state, board, peer_id);
            }
            *board_rx = None;
            None
        }
        ClientMessage::Change { event } => {
            let Some(board) = *current_board else {
                return Some(ServerMessage::Error {
                    message: RelayError::NotJoined.to_string(),
                });
            };
            match state.apply_change(board, &event) {
                Ok(()) => {
                    debug!("{:?} {:?} from {} on {}", event.op, event.table, peer_id, board);
                    state.broadcast(
                        board,
                        peer_id,
                        ServerMessage::Change {
                            from: peer_id.to_string(),
                            event,
                        },
                    );
                    None
                }
                Err(e) => {
                    warn!("Rejected change from {}: {}", peer_id, e);
                    Some(ServerMessage::Error { message: e.to_string() })
                }
            }
        }
        ClientMessage::Clear => {
            let Some(board) = *current_board else {
                return Some(ServerMessage::Error {
                    message: RelayError::NotJoined.to_string(),
                });
            };
            state.clear(board);
            state.broadcast(
                board,
                peer_id,
                ServerMessage::Cleared {
                    from: peer_id.to_string(),
                },
            );
            info!("Peer {} cleared board {}", peer_id, board);
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_board: Option<BoardId> = None;
    let mut board_rx: Option<broadcast::Receiver<(String, ServerMessage)>> = None;

    loop {
        tokio::select! {
            // Incoming messages from the client
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                        Ok(client_msg) => handle_message(
                            &state,
                            &peer_id,
                            client_msg,
                            &mut current_board,
                            &mut board_rx,
                        ),
                        Err(e) => {
                            warn!("Invalid message from {}: {}", peer_id, e);
                            Some(ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            })
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None, // Ignore binary, ping and pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                };
                if let Some(frame) = reply.as_ref().and_then(encode) {
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }

            // Messages from other peers on the board
            msg = async {
                match &mut board_rx {
                    Some(rx) => match rx.recv().await {
                        Ok(msg) => Some(msg),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Peer {} lagged behind by {} message(s)", peer_id, skipped);
                            None
                        }
                        Err(broadcast::error::RecvError::Closed) => None,
                    },
                    None => std::future::pending::<Option<(String, ServerMessage)>>().await,
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to sender
                    if from != peer_id {
                        if let Some(frame) = encode(&server_msg) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(board) = current_board {
        leave(&state, board, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}
