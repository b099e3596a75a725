//! Svara game engine.
//!
//! This module holds everything that decides what happens at a table:
//! - Card, player and game state entities
//! - Hand scoring
//! - Betting validation and round completion
//! - Side pots, rake and settlement
//! - The svara tie-break flow
//! - The state machine that ties them together

pub mod betting;
pub mod constants;
pub mod entities;
pub mod functional;
pub mod pot;
pub mod state_machine;
pub mod svara;

pub use betting::{ActionChoice, ActionChoices, PlayerAction};
pub use entities::{GameSettings, GameState, GameStatus, GameView};
pub use state_machine::{BalanceWrite, Command, GameError, Transition, WriteReason, apply};
