//! Notification WebSocket endpoint
//!
//! GET /ws?rooms=supplier:S1,suppliers
//!
//! Protocol:
//! - Hub → client: ServerMessage `{event, data}`
//! - Client → hub: ClientCommand (`join` / `leave` a room)
//!
//! Room membership lives only as long as the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use shared::error::AppError;
use shared::notify::{ClientCommand, Room, ServerMessage, events};
use tokio::time::Duration;

use crate::live::SessionId;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Comma-separated rooms to join on connect
    #[serde(default)]
    rooms: Option<String>,
}

/// GET /ws
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // Validate before upgrading so a bad room list gets a proper 400
    let rooms = query
        .rooms
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::parse::<Room>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, rooms)))
}

async fn ws_session(socket: WebSocket, state: AppState, rooms: Vec<Room>) {
    let (mut sink, mut stream) = socket.split();
    let (session_id, mut hub_rx) = state.hub.register();
    tracing::info!(session_id, "Notification WS connected");

    for room in rooms {
        join(&state, session_id, room);
    }

    let mut ping_interval = tokio::time::interval(Duration::from_secs(30));
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            outbound = hub_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if send_message(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_command(&state, session_id, &text);
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.hub.unregister(session_id);
    tracing::info!(session_id, "Notification WS disconnected");
}

/// Apply a client command; acks and errors go back through the hub queue
fn handle_command(state: &AppState, session_id: SessionId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Join { room }) => join(state, session_id, room),
        Ok(ClientCommand::Leave { room }) => {
            state.hub.leave(session_id, &room);
            state.hub.send_to(
                session_id,
                ServerMessage::new(events::ROOM_LEFT, json!({ "room": room })),
            );
        }
        Err(e) => {
            tracing::debug!(session_id, "Unreadable client command: {e}");
            state.hub.send_to(
                session_id,
                ServerMessage::new(events::ERROR, json!({ "message": e.to_string() })),
            );
        }
    }
}

fn join(state: &AppState, session_id: SessionId, room: Room) {
    let ack = ServerMessage::new(events::ROOM_JOINED, json!({ "room": room }));
    if state.hub.join(session_id, room) {
        state.hub.send_to(session_id, ack);
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(event = %msg.event, "Failed to serialize notification: {e}");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}
