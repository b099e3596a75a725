use rust_decimal::Decimal;
use std::time::Duration;

/// Cards dealt to every participant of a hand.
pub const CARDS_PER_HAND: usize = 3;

/// Size of the 7-through-ace deck.
pub const DECK_SIZE: usize = 32;

/// Maximum seats at a room. Ten players use 30 of the 32 cards.
pub const MAX_PLAYERS: usize = 10;

/// Score of three sevens (or a joker-completed equivalent).
pub const THREE_SEVENS_VALUE: u8 = 34;

/// Number of consecutive turn timeouts before a player is ejected.
pub const DEFAULT_MAX_INACTIVITY: u8 = 3;

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SVARA_DECISION_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SHOWDOWN_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(5000);

/// The house's cut of every awarded pot (5%).
pub fn rake_rate() -> Decimal {
    Decimal::new(5, 2)
}

/// One cent, the smallest unit leftover split money is handed out in.
pub fn cent() -> Decimal {
    Decimal::new(1, 2)
}
