//! In-process store. Records are kept serialized so every load hands out a
//! fresh copy, the same as a remote store would.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::{RwLock, broadcast};

use super::{
    GameStore,
    errors::{StoreError, StoreResult},
    models::Room,
};
use crate::game::{GameState, entities::RoomId};

const CHANNEL_CAPACITY: usize = 64;

struct Channels {
    game: broadcast::Sender<GameState>,
    room: broadcast::Sender<Room>,
}

impl Channels {
    fn new() -> Self {
        Self {
            game: broadcast::channel(CHANNEL_CAPACITY).0,
            room: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }
}

pub struct MemoryStore {
    games: RwLock<HashMap<RoomId, String>>,
    rooms: RwLock<HashMap<RoomId, String>>,
    channels: RwLock<HashMap<RoomId, Channels>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage. While unavailable every read and write fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store is offline".to_string()))
        }
    }

    async fn with_channels<T>(&self, room_id: RoomId, f: impl FnOnce(&Channels) -> T) -> T {
        if let Some(channels) = self.channels.read().await.get(&room_id) {
            return f(channels);
        }
        let mut channels = self.channels.write().await;
        f(channels.entry(room_id).or_insert_with(Channels::new))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn load_game(&self, room_id: RoomId) -> StoreResult<GameState> {
        self.check_available()?;
        let games = self.games.read().await;
        let raw = games.get(&room_id).ok_or(StoreError::Missing(room_id))?;
        Ok(serde_json::from_str(raw)?)
    }

    async fn save_game(&self, state: &GameState) -> StoreResult<()> {
        self.check_available()?;
        let raw = serde_json::to_string(state)?;
        self.games.write().await.insert(state.room_id, raw);
        Ok(())
    }

    async fn load_room(&self, room_id: RoomId) -> StoreResult<Room> {
        self.check_available()?;
        let rooms = self.rooms.read().await;
        let raw = rooms.get(&room_id).ok_or(StoreError::Missing(room_id))?;
        Ok(serde_json::from_str(raw)?)
    }

    async fn save_room(&self, room: &Room) -> StoreResult<()> {
        self.check_available()?;
        let raw = serde_json::to_string(room)?;
        self.rooms.write().await.insert(room.id, raw);
        Ok(())
    }

    async fn publish_game(&self, state: &GameState) -> StoreResult<()> {
        self.check_available()?;
        // No subscribers is fine.
        let _ = self
            .with_channels(state.room_id, |c| c.game.send(state.clone()))
            .await;
        Ok(())
    }

    async fn publish_room(&self, room: &Room) -> StoreResult<()> {
        self.check_available()?;
        let _ = self
            .with_channels(room.id, |c| c.room.send(room.clone()))
            .await;
        Ok(())
    }

    async fn subscribe_game(&self, room_id: RoomId) -> broadcast::Receiver<GameState> {
        self.with_channels(room_id, |c| c.game.subscribe()).await
    }

    async fn subscribe_room(&self, room_id: RoomId) -> broadcast::Receiver<Room> {
        self.with_channels(room_id, |c| c.room.subscribe()).await
    }

    async fn remove(&self, room_id: RoomId) -> StoreResult<()> {
        self.check_available()?;
        self.games.write().await.remove(&room_id);
        self.rooms.write().await.remove(&room_id);
        self.channels.write().await.remove(&room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{game::GameSettings, store::RoomStatus};
    use rust_decimal::Decimal;

    fn room(id: RoomId) -> Room {
        Room {
            id,
            name: format!("room {id}"),
            status: RoomStatus::Waiting,
            members: vec![],
            min_bet: Decimal::from(10),
            max_players: 6,
        }
    }

    #[tokio::test]
    async fn test_game_round_trips_through_store() {
        let store = MemoryStore::new();
        let state = GameState::new(3, Decimal::from(10), GameSettings::default());
        store.save_game(&state).await.expect("save");
        assert_eq!(store.load_game(3).await.expect("load"), state);
        assert!(matches!(
            store.load_game(4).await,
            Err(StoreError::Missing(4))
        ));
    }

    #[tokio::test]
    async fn test_outage_fails_reads_and_writes() {
        let store = MemoryStore::new();
        store.save_room(&room(1)).await.expect("save");
        store.set_available(false);
        assert!(matches!(
            store.load_room(1).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert_eq!(store.load_room(1).await.expect("load").name, "room 1");
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_state() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe_game(1).await;
        let state = GameState::new(1, Decimal::from(10), GameSettings::default());
        store.publish_game(&state).await.expect("publish");
        assert_eq!(rx.recv().await.expect("update"), state);

        let mut rooms = store.subscribe_room(1).await;
        store.publish_room(&room(1)).await.expect("publish");
        assert_eq!(rooms.recv().await.expect("room").id, 1);
    }
}
