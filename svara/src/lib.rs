//! # Svara
//!
//! A Svara (three-card) game engine, written as a pure state machine with
//! async room actors around it.
//!
//! Every change to a table goes through one function,
//! [`game::apply`], which takes a state and a command and returns the next
//! state, or an error that leaves the state untouched. The rest of the crate
//! feeds it commands and persists what comes out.
//!
//! ## Hand lifecycle
//!
//! - **Waiting**: fewer than two funded players seated
//! - **Ante**: everyone active pays the minimum bet
//! - **BlindBetting**: players bet without looking at their cards
//! - **Betting**: at least one player has looked
//! - **Showdown**: cards are open, scores compared
//! - **SvaraPending**: tied winners and the others decide whether to play a
//!   svara hand for the pot
//! - **Finished**: pot paid out, next hand after a short delay
//!
//! ## Core Modules
//!
//! - [`game`]: Entities, scoring, betting, pots and the state machine
//! - [`room`]: One actor per room, timers and the room manager
//! - [`ledger`]: Account balances with idempotent writes
//! - [`store`]: Game and room records plus update channels
//! - [`db`]: PostgreSQL pool used by the ledger
//!
//! ## Example
//!
//! ```
//! use rand::{SeedableRng, rngs::StdRng};
//! use rust_decimal::Decimal;
//! use svara::{Command, GameSettings, GameState, GameStatus, apply};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut state = GameState::new(1, Decimal::from(10), GameSettings::default());
//! for (id, name) in [(1, "alice"), (2, "bob")] {
//!     let join = Command::Join { player_id: id, username: name.into(), balance: Decimal::from(100) };
//!     state = apply(&state, join, &mut rng, chrono::Utc::now()).unwrap().state;
//! }
//! assert_eq!(state.status, GameStatus::BlindBetting);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    BalanceWrite, Command, GameError, GameSettings, GameState, GameStatus, GameView,
    PlayerAction, Transition, WriteReason, apply,
    constants::{self, MAX_PLAYERS},
    entities::{self, PlayerId, RoomId, Usd},
    functional,
};

/// Room actors, timers and the room manager.
pub mod room;

/// Account balances.
pub mod ledger;

/// Game and room records.
pub mod store;

/// Database connection management.
pub mod db;
