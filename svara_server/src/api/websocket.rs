//! WebSocket gateway for live rooms.
//!
//! A thin adapter: it translates the inbound envelope into room requests and
//! forwards the room's published state to each player, with other players'
//! cards hidden.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{room_id}?player_id=<id>&username=<name>`
//! 2. Server seats the player (a player already seated is reconnecting)
//! 3. Server sends one `game_state` event with the full view
//! 4. Every state the room publishes arrives as a `game_update` event
//! 5. Commands the room refuses come back as `error` events
//!
//! Disconnecting does not unseat the player. A player who never comes back
//! is folded by the turn timer and removed after repeated timeouts.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/1?player_id=7&username=ana');
//!
//! ws.onmessage = (event) => {
//!   const { event: name, payload } = JSON.parse(event.data);
//!   if (name === "error") {
//!     showError(payload.message);
//!   } else {
//!     render(payload);
//!   }
//! };
//!
//! ws.send(JSON.stringify({ room_id: 1, player_id: 7, action: "raise", amount: "20" }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use svara::{
    GameError, PlayerId, RoomId,
    room::{EventTarget, InboundCommand, OutboundEvent, RoomHandle, RoomRequest, RoomResponse},
};
use tokio::sync::{broadcast, mpsc};

use super::AppState;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    player_id: PlayerId,
    username: Option<String>,
}

/// Upgrade HTTP connection to WebSocket for one player in one room.
///
/// # Response
///
/// On success, upgrades connection to WebSocket protocol (101 Switching Protocols).
/// Returns `404 Not Found` when the room doesn't exist.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<RoomId>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(handle) = state.manager.get_room(room_id).await else {
        return (StatusCode::NOT_FOUND, "Room not found").into_response();
    };

    let username = query
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("player{}", query.player_id));

    ws.on_upgrade(move |socket| handle_socket(socket, handle, query.player_id, username, state))
}

/// Seat the player. Someone already at the table is reconnecting.
async fn seat(handle: &RoomHandle, player_id: PlayerId, username: String) -> RoomResponse {
    let response = handle
        .request(RoomRequest::Join {
            player_id,
            username,
        })
        .await;
    match response {
        RoomResponse::Rejected(ref msg) if *msg == GameError::AlreadySeated.to_string() => {
            info!("Player {} reconnected to room {}", player_id, handle.room_id());
            RoomResponse::Success
        }
        other => other,
    }
}

fn encode(event: &OutboundEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize {:?} event: {}", event.event, e);
            None
        }
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    handle: RoomHandle,
    player_id: PlayerId,
    username: String,
    state: AppState,
) {
    let room_id = handle.room_id();
    let (mut sender, mut receiver) = socket.split();

    info!("WebSocket connected: room={}, player={}", room_id, player_id);
    metrics::websocket_connections_total();
    metrics::websocket_connections_active(1.0);

    // Subscribe before seating so the update the join produces isn't missed.
    let mut updates = state.manager.store().subscribe_game(room_id).await;

    let joined = seat(&handle, player_id, username).await;
    if let Some(message) = joined.error_message() {
        logging::log_command_rejected(room_id, player_id, &message);
        if let Some(json) = encode(&OutboundEvent::error(player_id, message)) {
            let _ = sender.send(Message::Text(json.into())).await;
        }
        let _ = sender.close().await;
        metrics::websocket_connections_active(-1.0);
        return;
    }

    if let Some(view) = handle.view(Some(player_id)).await
        && let Some(json) = encode(&OutboundEvent::game_state(player_id, &view))
        && sender.send(Message::Text(json.into())).await.is_err()
    {
        metrics::websocket_connections_active(-1.0);
        return;
    }

    // Error events for this player, from the receive loop below.
    let (event_tx, mut event_rx) = mpsc::channel::<OutboundEvent>(32);

    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                update = updates.recv() => match update {
                    Ok(game) => OutboundEvent::game_update(
                        EventTarget::Room(room_id),
                        &game.view_for(Some(player_id)),
                    ),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only the latest state matters.
                        debug!("Player {} skipped {} updates in room {}", player_id, skipped, room_id);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(event) = event_rx.recv() => event,
            };

            let Some(json) = encode(&event) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics::websocket_messages_sent();
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(message) = handle_client_message(&handle, player_id, text.as_str()).await
                    && event_tx
                        .send(OutboundEvent::error(player_id, message))
                        .await
                        .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed: room={}, player={}", room_id, player_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    metrics::websocket_connections_active(-1.0);
    info!("WebSocket disconnected: room={}, player={}", room_id, player_id);
}

/// Parse one client message and forward it to the room.
///
/// Envelopes naming another player or room are refused.
async fn handle_client_message(
    handle: &RoomHandle,
    player_id: PlayerId,
    text: &str,
) -> Result<(), String> {
    let command: InboundCommand = serde_json::from_str(text).map_err(|e| {
        warn!("Failed to parse client message: {}", e);
        "Invalid message format".to_string()
    })?;

    if command.player_id != player_id || command.room_id != handle.room_id() {
        return Err("Command does not match this connection".to_string());
    }

    let action = command.action.to_string();
    let request = command.into_request()?;
    let response = handle.request(request).await;
    metrics::commands_total(&action, response.is_success());

    match response.error_message() {
        None => Ok(()),
        Some(message) => {
            logging::log_command_rejected(handle.room_id(), player_id, &message);
            Err(message)
        }
    }
}
