//! Which room each player is sitting in.
//!
//! Rooms write absolute balances back to the ledger, so a player may only
//! hold one seat at a time across the whole server.

use crate::game::entities::{PlayerId, RoomId};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Seats held across every room managed by one [`RoomManager`](super::RoomManager).
#[derive(Clone, Debug, Default)]
pub struct SeatRegistry {
    seats: Arc<RwLock<HashMap<PlayerId, RoomId>>>,
}

impl SeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a seat for `player_id` in `room_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the seat was free and is now held
    /// * `Ok(false)` - the player already sits in this room
    /// * `Err(room)` - the player sits in another room
    pub async fn claim(&self, player_id: PlayerId, room_id: RoomId) -> Result<bool, RoomId> {
        let mut seats = self.seats.write().await;
        match seats.get(&player_id) {
            Some(&held) if held == room_id => Ok(false),
            Some(&held) => Err(held),
            None => {
                seats.insert(player_id, room_id);
                Ok(true)
            }
        }
    }

    /// Free the player's seat if `room_id` holds it.
    pub async fn release(&self, player_id: PlayerId, room_id: RoomId) {
        let mut seats = self.seats.write().await;
        if seats.get(&player_id) == Some(&room_id) {
            seats.remove(&player_id);
        }
    }

    pub async fn release_room(&self, room_id: RoomId) {
        self.seats.write().await.retain(|_, held| *held != room_id);
    }

    pub async fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.seats.read().await.get(&player_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_seat_per_player() {
        let seats = SeatRegistry::new();
        assert_eq!(seats.claim(1, 10).await, Ok(true));
        assert_eq!(seats.claim(1, 10).await, Ok(false));
        assert_eq!(seats.claim(1, 20).await, Err(10));
        assert_eq!(seats.claim(2, 20).await, Ok(true));
        assert_eq!(seats.room_of(1).await, Some(10));
    }

    #[tokio::test]
    async fn test_release_only_from_holding_room() {
        let seats = SeatRegistry::new();
        seats.claim(1, 10).await.expect("free seat");
        seats.release(1, 20).await;
        assert_eq!(seats.room_of(1).await, Some(10));

        seats.release(1, 10).await;
        assert_eq!(seats.room_of(1).await, None);
        assert_eq!(seats.claim(1, 20).await, Ok(true));
    }

    #[tokio::test]
    async fn test_release_room_frees_its_players() {
        let seats = SeatRegistry::new();
        seats.claim(1, 10).await.expect("free seat");
        seats.claim(2, 10).await.expect("free seat");
        seats.claim(3, 20).await.expect("free seat");
        seats.release_room(10).await;
        assert_eq!(seats.room_of(1).await, None);
        assert_eq!(seats.room_of(2).await, None);
        assert_eq!(seats.room_of(3).await, Some(20));
    }
}
