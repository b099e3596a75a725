//! Store module: where room and game records live between commands, and the
//! channels their updates are published on.
//!
//! A room's actor is the only writer of its records. Everyone else reads or
//! subscribes.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::game::{GameState, entities::RoomId};

pub mod errors;
pub mod memory;
pub mod models;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{Room, RoomStatus};

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn load_game(&self, room_id: RoomId) -> StoreResult<GameState>;
    async fn save_game(&self, state: &GameState) -> StoreResult<()>;
    async fn load_room(&self, room_id: RoomId) -> StoreResult<Room>;
    async fn save_room(&self, room: &Room) -> StoreResult<()>;

    /// Fan the full state out to every subscriber of the room.
    async fn publish_game(&self, state: &GameState) -> StoreResult<()>;
    async fn publish_room(&self, room: &Room) -> StoreResult<()>;
    async fn subscribe_game(&self, room_id: RoomId) -> broadcast::Receiver<GameState>;
    async fn subscribe_room(&self, room_id: RoomId) -> broadcast::Receiver<Room>;

    /// Drop every record and channel of a room.
    async fn remove(&self, room_id: RoomId) -> StoreResult<()>;
}
