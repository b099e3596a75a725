//! Room records kept next to each game state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::{
    GameStatus,
    entities::{PlayerId, RoomId, Usd},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
    /// Money invariants broke. The room accepts no more commands until an
    /// operator has looked at it.
    Reconciliation,
    Closed,
}

impl RoomStatus {
    /// Status implied by a game phase.
    pub fn from_game(status: GameStatus) -> Self {
        match status {
            GameStatus::Waiting => Self::Waiting,
            GameStatus::Finished => Self::Finished,
            _ => Self::Playing,
        }
    }

    pub fn accepts_commands(self) -> bool {
        !matches!(self, Self::Reconciliation | Self::Closed)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Reconciliation => "reconciliation",
            Self::Closed => "closed",
        };
        write!(f, "{repr}")
    }
}

/// Membership and settings of one room.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    /// Seated and waitlisted players.
    pub members: Vec<PlayerId>,
    pub min_bet: Usd,
    pub max_players: usize,
}
