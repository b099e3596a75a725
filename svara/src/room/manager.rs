//! Room manager for spawning and managing multiple room actors.

use super::{
    actor::{RoomActor, RoomHandle},
    config::RoomConfig,
    messages::{RoomMessage, RoomResponse},
    seats::SeatRegistry,
};
use crate::{
    game::entities::{PlayerId, RoomId},
    ledger::Ledger,
    store::{GameStore, Room},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, oneshot};

/// Room manager for managing multiple room instances
pub struct RoomManager {
    /// Game and room records
    store: Arc<dyn GameStore>,

    /// Account balances
    ledger: Arc<dyn Ledger>,

    /// Active room handles
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,

    /// One seat per player across all rooms
    seats: SeatRegistry,

    /// Next room ID
    next_room_id: Arc<RwLock<RoomId>>,
}

impl RoomManager {
    /// Create a new room manager
    ///
    /// # Arguments
    ///
    /// * `store` - Where rooms keep their state
    /// * `ledger` - Account balances
    pub fn new(store: Arc<dyn GameStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            store,
            ledger,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            seats: SeatRegistry::new(),
            next_room_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Create and spawn a new room
    ///
    /// # Returns
    ///
    /// * `Result<RoomId, String>` - Room ID or error
    pub async fn create_room(&self, config: RoomConfig) -> Result<RoomId, String> {
        config.validate()?;

        let mut next_id = self.next_room_id.write().await;
        let room_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let name = config.name.clone();
        let (actor, handle) = RoomActor::new(room_id, config, self.store.clone(), self.ledger.clone());
        let actor = actor.with_seats(self.seats.clone());
        actor
            .init()
            .await
            .map_err(|e| format!("Failed to create room: {e}"))?;

        self.rooms.write().await.insert(room_id, handle);
        tokio::spawn(actor.run());

        log::info!("Created room {} '{}'", room_id, name);
        Ok(room_id)
    }

    /// Get a room handle by ID
    pub async fn get_room(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    /// List all open rooms, ordered by ID
    pub async fn list_rooms(&self) -> Vec<Room> {
        let ids: Vec<RoomId> = self.rooms.read().await.keys().copied().collect();

        let mut rooms = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.load_room(id).await {
                Ok(room) => rooms.push(room),
                Err(e) => log::warn!("Skipping room {id} in listing: {e}"),
            }
        }
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    /// Close a room. Refused while a hand is being played.
    pub async fn close_room(&self, room_id: RoomId) -> Result<(), String> {
        let handle = self
            .get_room(room_id)
            .await
            .ok_or_else(|| format!("Room {room_id} not found"))?;

        let (response, rx) = oneshot::channel();
        handle.send(RoomMessage::Close { response }).await?;
        let response = rx.await.unwrap_or(RoomResponse::Closed);
        match response {
            RoomResponse::Success | RoomResponse::Closed => {}
            other => return Err(other.error_message().unwrap_or_default()),
        }

        self.rooms.write().await.remove(&room_id);
        if let Err(e) = self.store.remove(room_id).await {
            log::warn!("Room {room_id} closed but its records remain: {e}");
        }

        log::info!("Closed room {}", room_id);
        Ok(())
    }

    /// Get count of active rooms
    pub async fn active_room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub fn store(&self) -> Arc<dyn GameStore> {
        self.store.clone()
    }

    /// The room `player_id` is seated in, if any.
    pub async fn seated_in(&self, player_id: PlayerId) -> Option<RoomId> {
        self.seats.room_of(player_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::MemoryLedger, room::RoomRequest, store::MemoryStore};
    use rust_decimal::Decimal;

    fn manager() -> RoomManager {
        RoomManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryLedger::with_default_balance(Decimal::from(100))),
        )
    }

    #[tokio::test]
    async fn test_create_and_list_rooms() {
        let manager = manager();
        let first = manager
            .create_room(RoomConfig::default())
            .await
            .expect("create");
        let second = manager
            .create_room(RoomConfig {
                name: "High stakes".to_string(),
                min_bet: Decimal::from(50),
                ..RoomConfig::default()
            })
            .await
            .expect("create");
        assert_eq!((first, second), (1, 2));

        let rooms = manager.list_rooms().await;
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[1].name, "High stakes");
        assert_eq!(manager.active_room_count().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let manager = manager();
        let config = RoomConfig {
            max_players: 1,
            ..RoomConfig::default()
        };
        assert!(manager.create_room(config).await.is_err());
        assert_eq!(manager.active_room_count().await, 0);
    }

    async fn join(manager: &RoomManager, room_id: RoomId, player_id: PlayerId) -> RoomResponse {
        manager
            .get_room(room_id)
            .await
            .expect("room")
            .request(RoomRequest::Join {
                player_id,
                username: format!("p{player_id}"),
            })
            .await
    }

    #[tokio::test]
    async fn test_player_sits_in_one_room_at_a_time() {
        let manager = manager();
        let first = manager.create_room(RoomConfig::default()).await.expect("create");
        let second = manager.create_room(RoomConfig::default()).await.expect("create");

        assert!(join(&manager, first, 1).await.is_success());
        assert_eq!(
            join(&manager, second, 1).await,
            RoomResponse::Rejected(format!("Already seated in room {first}"))
        );
        assert_eq!(manager.seated_in(1).await, Some(first));
        let record = manager.get_room(second).await.expect("room").room().await.expect("record");
        assert!(record.members.is_empty());

        let left = manager
            .get_room(first)
            .await
            .expect("room")
            .request(RoomRequest::Leave { player_id: 1 })
            .await;
        assert!(left.is_success());
        assert_eq!(manager.seated_in(1).await, None);
        assert!(join(&manager, second, 1).await.is_success());
        assert_eq!(manager.seated_in(1).await, Some(second));
    }

    #[tokio::test]
    async fn test_failed_join_frees_the_seat() {
        let manager = RoomManager::new(Arc::new(MemoryStore::new()), Arc::new(MemoryLedger::new()));
        let room = manager.create_room(RoomConfig::default()).await.expect("create");
        assert!(!join(&manager, room, 1).await.is_success());
        assert_eq!(manager.seated_in(1).await, None);
    }

    #[tokio::test]
    async fn test_close_frees_seats() {
        let manager = manager();
        let room = manager.create_room(RoomConfig::default()).await.expect("create");
        join(&manager, room, 1).await;
        manager.close_room(room).await.expect("close");
        assert_eq!(manager.seated_in(1).await, None);
    }

    #[tokio::test]
    async fn test_close_removes_room() {
        let manager = manager();
        let id = manager
            .create_room(RoomConfig::default())
            .await
            .expect("create");
        manager.close_room(id).await.expect("close");
        assert!(manager.get_room(id).await.is_none());
        assert!(manager.store().load_room(id).await.is_err());
        assert!(manager.close_room(id).await.is_err());
    }
}
