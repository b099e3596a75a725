//! Room actor message types and the events the gateway sends to clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::{
    game::{
        GameError, GameView, PlayerAction,
        entities::{PlayerId, RoomId, Usd},
    },
    ledger::LedgerError,
    store::{Room, StoreError},
};

/// A player request for a room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomRequest {
    Join { player_id: PlayerId, username: String },
    Leave { player_id: PlayerId },
    Act { player_id: PlayerId, action: PlayerAction },
    SvaraDecision { player_id: PlayerId, join: bool },
}

impl RoomRequest {
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::Join { player_id, .. }
            | Self::Leave { player_id }
            | Self::Act { player_id, .. }
            | Self::SvaraDecision { player_id, .. } => *player_id,
        }
    }
}

/// Messages that can be sent to a RoomActor
#[derive(Debug)]
pub enum RoomMessage {
    /// A player request, answered once it has been applied or rejected
    Request {
        request: RoomRequest,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Current state as seen by `player_id` (`None` for spectators)
    GetState {
        player_id: Option<PlayerId>,
        response: oneshot::Sender<Option<GameView>>,
    },

    /// Current room record
    GetRoom {
        response: oneshot::Sender<Option<Room>>,
    },

    /// Close the room (between hands only)
    Close {
        response: oneshot::Sender<RoomResponse>,
    },
}

/// Why a room couldn't apply a request.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The request broke a game rule. Nothing changed.
    #[error(transparent)]
    Validation(#[from] GameError),

    /// Refused for a reason outside the game rules
    #[error("{0}")]
    Rejected(String),

    /// Store or ledger trouble. Safe to retry.
    #[error("server busy: {0}")]
    ServerBusy(String),

    /// The room's money no longer adds up
    #[error("room is under reconciliation")]
    Reconciliation,

    #[error("room is closed")]
    Closed,
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        Self::ServerBusy(err.to_string())
    }
}

impl From<LedgerError> for RoomError {
    fn from(err: LedgerError) -> Self {
        if err.is_retryable() {
            Self::ServerBusy(err.client_message())
        } else {
            Self::Rejected(err.client_message())
        }
    }
}

/// Response from room operations
#[derive(Debug, Clone, PartialEq)]
pub enum RoomResponse {
    /// Operation succeeded
    Success,

    /// Operation refused, state unchanged
    Rejected(String),

    /// Temporary failure, try again
    ServerBusy(String),

    /// Room is flagged for manual reconciliation
    Reconciliation,

    /// Room no longer accepts requests
    Closed,
}

impl From<RoomError> for RoomResponse {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Validation(e) => Self::Rejected(e.to_string()),
            RoomError::Rejected(msg) => Self::Rejected(msg),
            RoomError::ServerBusy(msg) => Self::ServerBusy(msg),
            RoomError::Reconciliation => Self::Reconciliation,
            RoomError::Closed => Self::Closed,
        }
    }
}

impl RoomResponse {
    /// Check if response is success
    pub fn is_success(&self) -> bool {
        matches!(self, RoomResponse::Success)
    }

    /// Get error message if response is error
    pub fn error_message(&self) -> Option<String> {
        match self {
            RoomResponse::Success => None,
            RoomResponse::Rejected(msg) => Some(msg.clone()),
            RoomResponse::ServerBusy(msg) => Some(format!("Server busy, try again ({msg})")),
            RoomResponse::Reconciliation => {
                Some("Room is suspended pending reconciliation".to_string())
            }
            RoomResponse::Closed => Some("Room is closed".to_string()),
        }
    }
}

/// What a client sends: `{room_id, player_id, action, amount?}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InboundCommand {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub action: InboundAction,
    #[serde(default)]
    pub amount: Option<Usd>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InboundAction {
    Leave,
    Blind,
    Look,
    Call,
    Raise,
    Fold,
    AllIn,
    SvaraJoin,
    SvaraDecline,
}

impl fmt::Display for InboundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Leave => "leave",
            Self::Blind => "blind",
            Self::Look => "look",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::Fold => "fold",
            Self::AllIn => "all_in",
            Self::SvaraJoin => "svara_join",
            Self::SvaraDecline => "svara_decline",
        };
        write!(f, "{repr}")
    }
}

impl InboundCommand {
    /// Turn the envelope into a room request. Joining goes through the
    /// connection handshake, not this envelope.
    pub fn into_request(self) -> Result<RoomRequest, String> {
        let player_id = self.player_id;
        let request = match self.action {
            InboundAction::Leave => RoomRequest::Leave { player_id },
            InboundAction::SvaraJoin => RoomRequest::SvaraDecision {
                player_id,
                join: true,
            },
            InboundAction::SvaraDecline => RoomRequest::SvaraDecision {
                player_id,
                join: false,
            },
            InboundAction::Raise => {
                let amount = self.amount.ok_or("raise needs an amount")?;
                RoomRequest::Act {
                    player_id,
                    action: PlayerAction::Raise { amount },
                }
            }
            other => {
                let action = match other {
                    InboundAction::Blind => PlayerAction::Blind,
                    InboundAction::Look => PlayerAction::Look,
                    InboundAction::Call => PlayerAction::Call,
                    InboundAction::Fold => PlayerAction::Fold,
                    _ => PlayerAction::AllIn,
                };
                RoomRequest::Act { player_id, action }
            }
        };
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventTarget {
    Room(RoomId),
    Player(PlayerId),
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    GameState,
    GameUpdate,
    Error,
}

/// An event for the gateway to deliver.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutboundEvent {
    pub target: EventTarget,
    pub event: EventName,
    pub payload: serde_json::Value,
}

impl OutboundEvent {
    /// Full state sent to a player as they join.
    pub fn game_state(player_id: PlayerId, view: &GameView) -> Self {
        Self {
            target: EventTarget::Player(player_id),
            event: EventName::GameState,
            payload: serde_json::to_value(view).unwrap_or_default(),
        }
    }

    pub fn game_update(target: EventTarget, view: &GameView) -> Self {
        Self {
            target,
            event: EventName::GameUpdate,
            payload: serde_json::to_value(view).unwrap_or_default(),
        }
    }

    pub fn error(player_id: PlayerId, message: impl Into<String>) -> Self {
        Self {
            target: EventTarget::Player(player_id),
            event: EventName::Error,
            payload: serde_json::json!({ "message": message.into() }),
        }
    }
}
