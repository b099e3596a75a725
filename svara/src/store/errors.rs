//! Store error types.

use thiserror::Error;

use crate::game::entities::RoomId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store can't be reached right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No record for the room
    #[error("No record for room {0}")]
    Missing(RoomId),

    /// A record didn't (de)serialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
