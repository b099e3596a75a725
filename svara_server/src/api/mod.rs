//! HTTP/WebSocket API for the game server.
//!
//! # Modules
//!
//! - [`rooms`]: Room management (list, open, close, seat a player, send a command)
//! - [`websocket`]: Live connection per player: commands in, game events out
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                              - Health check
//! GET    /api/rooms                           - List rooms
//! POST   /api/rooms                           - Open a room
//! GET    /api/rooms/{room_id}                 - Room record and spectator view
//! DELETE /api/rooms/{room_id}                 - Close a room between hands
//! POST   /api/rooms/{room_id}/join            - Seat a player
//! POST   /api/rooms/{room_id}/commands        - Apply a command envelope
//! GET    /ws/{room_id}?player_id=&username=   - WebSocket
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use svara::{ledger::MemoryLedger, room::RoomManager, store::MemoryStore};
//! use svara_server::api::{AppState, create_router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = RoomManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryLedger::with_default_balance(Decimal::from(100))),
//! );
//! let app = create_router(AppState {
//!     manager: Arc::new(manager),
//!     database: None,
//! });
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:6969").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod rooms;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use svara::{db::Database, room::RoomManager};
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RoomManager>,
    /// Pool behind the ledger, when balances live in PostgreSQL
    pub database: Option<Database>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws/{room_id}", get(websocket::websocket_handler))
        .route(
            "/api/rooms",
            get(rooms::list_rooms).post(rooms::create_room),
        )
        .route(
            "/api/rooms/{room_id}",
            get(rooms::get_room).delete(rooms::close_room),
        )
        .route("/api/rooms/{room_id}/join", post(rooms::join_room))
        .route("/api/rooms/{room_id}/commands", post(rooms::send_command))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when every component is healthy, or
/// `503 Service Unavailable` when the ledger database doesn't answer.
///
/// # Example
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","version":"0.1.0","database":null,"rooms":{"active_count":1}}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.database {
        Some(db) => Some(db.health().await),
        None => None,
    };
    let active_count = state.manager.active_room_count().await;

    let healthy = database.as_ref().is_none_or(|db| db.healthy);
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "rooms": {
            "active_count": active_count
        },
    });

    (status_code, Json(response))
}
