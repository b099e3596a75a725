//! Room module: one async actor per Svara room.
//!
//! This module implements:
//! - RoomActor: the only writer of a room's game state
//! - RoomManager: creates, lists and closes rooms
//! - TurnScheduler: the room's single pending deadline
//! - SeatRegistry: keeps each player to one seat across rooms
//! - Message types for requests, responses and client events
//!
//! ## Architecture
//!
//! Each room runs in its own Tokio task with an mpsc inbox. Player
//! requests and timer expiries are applied one at a time: the actor loads
//! the state from the [`GameStore`](crate::store::GameStore), applies the
//! command through [`state_machine::apply`](crate::game::state_machine::apply),
//! saves the result, writes balances to the [`Ledger`](crate::ledger::Ledger)
//! and publishes the new state. A rejected command changes nothing.
//!
//! ## Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use svara::{
//!     ledger::MemoryLedger,
//!     room::{RoomConfig, RoomManager, RoomRequest},
//!     store::MemoryStore,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), String> {
//! let manager = RoomManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryLedger::with_default_balance(Decimal::from(100))),
//! );
//! let room_id = manager.create_room(RoomConfig::default()).await?;
//! let room = manager.get_room(room_id).await.ok_or("room vanished")?;
//!
//! let response = room
//!     .request(RoomRequest::Join { player_id: 1, username: "alice".into() })
//!     .await;
//! assert!(response.is_success());
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;
pub mod scheduler;
pub mod seats;

pub use actor::{RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use manager::RoomManager;
pub use messages::{
    EventName, EventTarget, InboundAction, InboundCommand, OutboundEvent, RoomError, RoomMessage,
    RoomRequest, RoomResponse,
};
pub use scheduler::{TimerKind, TurnScheduler};
pub use seats::SeatRegistry;
