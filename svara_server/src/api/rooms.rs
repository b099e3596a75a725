//! Room management API handlers.
//!
//! This module provides HTTP REST endpoints for room operations including:
//! - Listing open rooms with their members and stakes
//! - Opening and closing rooms
//! - Reading a room's state as a spectator sees it
//! - Seating a player and sending the same command envelope the WebSocket takes
//!
//! # Examples
//!
//! List all rooms:
//! ```bash
//! curl http://localhost:6969/api/rooms
//! ```
//!
//! Act in a room:
//! ```bash
//! curl -X POST http://localhost:6969/api/rooms/1/commands \
//!   -H "Content-Type: application/json" \
//!   -d '{"room_id": 1, "player_id": 7, "action": "raise", "amount": "20"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use svara::{
    GameView, PlayerId, RoomId,
    room::{InboundCommand, RoomConfig, RoomRequest, RoomResponse},
    store::Room,
};

use super::AppState;
use crate::{logging, metrics};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct CreatedRoom {
    pub id: RoomId,
}

#[derive(Debug, Serialize)]
pub struct RoomDetail {
    pub room: Room,
    pub state: GameView,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub player_id: PlayerId,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CommandAccepted {
    pub message: String,
}

/// HTTP status for a room's answer.
pub fn status_for(response: &RoomResponse) -> StatusCode {
    match response {
        RoomResponse::Success => StatusCode::OK,
        RoomResponse::Rejected(_) => StatusCode::BAD_REQUEST,
        RoomResponse::ServerBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
        RoomResponse::Reconciliation => StatusCode::CONFLICT,
        RoomResponse::Closed => StatusCode::GONE,
    }
}

/// Forward a request to a room and turn its answer into an HTTP result.
pub(crate) async fn dispatch(
    state: &AppState,
    room_id: RoomId,
    request: RoomRequest,
    action: &str,
) -> Result<Json<CommandAccepted>, ApiError> {
    let handle = state
        .manager
        .get_room(room_id)
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Room {room_id} not found")))?;

    let player_id = request.player_id();
    let started = Instant::now();
    let response = handle.request(request).await;
    let elapsed = started.elapsed();
    logging::log_performance(action, elapsed.as_millis() as u64, room_id);
    metrics::command_duration_ms(action, elapsed.as_secs_f64() * 1000.0);
    metrics::commands_total(action, response.is_success());

    match response.error_message() {
        None => Ok(Json(CommandAccepted {
            message: format!("{action} accepted"),
        })),
        Some(message) => {
            logging::log_command_rejected(room_id, player_id, &message);
            Err(error(status_for(&response), message))
        }
    }
}

/// List all open rooms.
///
/// # Response
///
/// Returns `200 OK` with the room records, ordered by ID:
/// ```json
/// [
///   {
///     "id": 1,
///     "name": "Svara Room",
///     "status": "playing",
///     "members": [7, 9],
///     "min_bet": "10",
///     "max_players": 10
///   }
/// ]
/// ```
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<Room>> {
    Json(state.manager.list_rooms().await)
}

/// Open a new room.
///
/// The body is a room configuration. Missing fields take their defaults.
///
/// # Errors
///
/// - `400 Bad Request`: The configuration doesn't validate
pub async fn create_room(
    State(state): State<AppState>,
    Json(config): Json<RoomConfig>,
) -> Result<(StatusCode, Json<CreatedRoom>), ApiError> {
    let id = state
        .manager
        .create_room(config)
        .await
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    metrics::active_rooms(state.manager.active_room_count().await);
    Ok((StatusCode::CREATED, Json(CreatedRoom { id })))
}

/// Get a room's record and its state as a spectator sees it.
///
/// # Errors
///
/// - `404 Not Found`: Room doesn't exist
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<RoomDetail>, ApiError> {
    let not_found = || error(StatusCode::NOT_FOUND, format!("Room {room_id} not found"));
    let handle = state.manager.get_room(room_id).await.ok_or_else(not_found)?;
    let room = handle.room().await.ok_or_else(not_found)?;
    let view = handle.view(None).await.ok_or_else(not_found)?;
    Ok(Json(RoomDetail { room, state: view }))
}

/// Close a room. Refused while a hand is being played.
///
/// # Errors
///
/// - `404 Not Found`: Room doesn't exist
/// - `409 Conflict`: A hand is in progress
pub async fn close_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<StatusCode, ApiError> {
    if state.manager.get_room(room_id).await.is_none() {
        return Err(error(
            StatusCode::NOT_FOUND,
            format!("Room {room_id} not found"),
        ));
    }
    state
        .manager
        .close_room(room_id)
        .await
        .map_err(|e| error(StatusCode::CONFLICT, e))?;
    metrics::active_rooms(state.manager.active_room_count().await);
    Ok(StatusCode::NO_CONTENT)
}

/// Seat a player, reading their balance from the ledger.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown account, room full or already seated
/// - `404 Not Found`: Room doesn't exist
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(body): Json<JoinRoomRequest>,
) -> Result<Json<CommandAccepted>, ApiError> {
    let request = RoomRequest::Join {
        player_id: body.player_id,
        username: body.username,
    };
    dispatch(&state, room_id, request, "join").await
}

/// Apply a command envelope, the same one WebSocket clients send.
///
/// # Errors
///
/// - `400 Bad Request`: The envelope names another room or the game refused it
/// - `404 Not Found`: Room doesn't exist
/// - `503 Service Unavailable`: Store or ledger trouble, safe to retry
pub async fn send_command(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(command): Json<InboundCommand>,
) -> Result<Json<CommandAccepted>, ApiError> {
    if command.room_id != room_id {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Command is addressed to another room",
        ));
    }
    let action = command.action.to_string();
    let request = command
        .into_request()
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    dispatch(&state, room_id, request, &action).await
}
