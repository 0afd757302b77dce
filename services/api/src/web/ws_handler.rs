//! services/api/src/web/ws_handler.rs
//!
//! The realtime slot feed. A connection subscribes to the slot table, gets a
//! snapshot of every row, then receives one change frame per mutation. The
//! connection's only state is its `SlotBoard` fold of the feed.

use crate::web::{
    protocol::{ClientMessage, ServerMessage, SlotDto},
    state::AppState,
};
use academeet_core::domain::Caller;
use academeet_core::projection::{SlotBoard, SlotEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The one table the change feed serves.
const SLOTS_TABLE: &str = "slots";

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, caller))
}

fn to_frame(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            None
        }
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match to_frame(msg) {
        Some(frame) => sender.send(frame).await,
        None => Ok(()),
    }
}

fn snapshot_message(board: &SlotBoard) -> ServerMessage {
    ServerMessage::Snapshot {
        slots: board.slots().into_iter().map(SlotDto::from).collect(),
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, caller: Caller) {
    info!("New WebSocket connection established for user: {}", caller.user_id);

    let (mut sender, mut receiver) = socket.split();

    // --- 1. Subscription Phase ---
    // The first frame must name the table; anything else ends the connection.
    match receiver.next().await {
        Some(Ok(Message::Text(json))) => match serde_json::from_str::<ClientMessage>(&json) {
            Ok(ClientMessage::Subscribe { table }) if table == SLOTS_TABLE => {}
            Ok(ClientMessage::Subscribe { table }) => {
                warn!("Subscription requested for unknown table '{}'", table);
                let msg = ServerMessage::Error {
                    message: format!("Unknown table '{}'; only '{}' is served", table, SLOTS_TABLE),
                };
                let _ = send(&mut sender, &msg).await;
                return;
            }
            Err(e) => {
                warn!("First message was not a valid subscribe message: {}", e);
                let msg = ServerMessage::Error {
                    message: "Expected a subscribe message".to_string(),
                };
                let _ = send(&mut sender, &msg).await;
                return;
            }
        },
        _ => {
            info!("Client disconnected before subscribing.");
            return;
        }
    }

    // --- 2. Snapshot Phase ---
    // Subscribe to the feed first, then read the snapshot: a mutation that
    // lands in between is buffered in the channel and folded into the board,
    // where insert de-duplication makes the overlap harmless.
    let mut events = app_state.slot_events.subscribe();
    let mut board = match app_state.db.list_all_slots().await {
        Ok(snapshot) => SlotBoard::from_snapshot(snapshot),
        Err(e) => {
            error!("Failed to load slot snapshot: {:?}", e);
            let msg = ServerMessage::Error {
                message: "Failed to load slot data".to_string(),
            };
            let _ = send(&mut sender, &msg).await;
            return;
        }
    };

    let subscribed = ServerMessage::Subscribed {
        table: SLOTS_TABLE.to_string(),
    };
    if send(&mut sender, &subscribed).await.is_err() {
        return;
    }
    if send(&mut sender, &snapshot_message(&board)).await.is_err() {
        return;
    }

    // --- 3. Feed Loop ---
    if let Err(e) = feed_loop(&app_state, &mut board, &mut events, &mut sender, &mut receiver).await
    {
        error!("WebSocket feed failed: {:?}", e);
    }
    info!("WebSocket connection closed for user: {}", caller.user_id);
}

/// Forwards change events to the client until it disconnects. On channel
/// lag the board is rebuilt from a fresh snapshot and re-sent whole.
async fn feed_loop(
    app_state: &Arc<AppState>,
    board: &mut SlotBoard,
    events: &mut broadcast::Receiver<SlotEvent>,
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
) -> Result<(), axum::Error> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    board.apply(&event);
                    send(sender, &ServerMessage::change(&event)).await?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Slot feed lagged by {} events; re-sending snapshot", skipped);
                    match app_state.db.list_all_slots().await {
                        Ok(snapshot) => {
                            *board = SlotBoard::from_snapshot(snapshot);
                            send(sender, &snapshot_message(board)).await?;
                        }
                        Err(e) => {
                            error!("Failed to reload slot snapshot: {:?}", e);
                            send(sender, &ServerMessage::Error {
                                message: "Failed to reload slot data".to_string(),
                            })
                            .await?;
                            return Ok(());
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the connection.");
                    return Ok(());
                }
                Some(Ok(_)) => {
                    // Nothing else is expected after the subscribe frame.
                }
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {:?}", e);
                    return Ok(());
                }
            },
        }
    }
}
