//! Room configuration models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    GameSettings,
    constants::{
        DEFAULT_MAX_INACTIVITY, DEFAULT_RESTART_DELAY, DEFAULT_SHOWDOWN_DELAY,
        DEFAULT_SVARA_DECISION_TIMEOUT, DEFAULT_TURN_TIMEOUT, MAX_PLAYERS,
    },
    entities::Usd,
};

/// Room configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Room name
    pub name: String,

    /// Maximum number of seats (2..=10)
    pub max_players: usize,

    /// Ante and minimum raise
    pub min_bet: Usd,

    /// Seconds a player has to act before being folded
    pub turn_timeout_secs: u64,

    /// Seconds the svara confirm/decline window stays open
    pub svara_decision_secs: u64,

    /// Pause between showdown and settlement
    pub showdown_delay_ms: u64,

    /// Pause between a finished hand and the next deal
    pub restart_delay_ms: u64,

    /// Consecutive timeouts before a player is removed
    pub max_inactivity: u8,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "Svara Room".to_string(),
            max_players: MAX_PLAYERS,
            min_bet: Decimal::from(10),
            turn_timeout_secs: DEFAULT_TURN_TIMEOUT.as_secs(),
            svara_decision_secs: DEFAULT_SVARA_DECISION_TIMEOUT.as_secs(),
            showdown_delay_ms: DEFAULT_SHOWDOWN_DELAY.as_millis() as u64,
            restart_delay_ms: DEFAULT_RESTART_DELAY.as_millis() as u64,
            max_inactivity: DEFAULT_MAX_INACTIVITY,
        }
    }
}

impl RoomConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Room name must not be empty".to_string());
        }

        if !(2..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(format!("Max players must be between 2 and {MAX_PLAYERS}"));
        }

        if self.min_bet <= Decimal::ZERO {
            return Err("Minimum bet must be positive".to_string());
        }

        if self.min_bet.round_dp(2) != self.min_bet {
            return Err("Minimum bet must be in whole cents".to_string());
        }

        if self.turn_timeout_secs == 0 || self.svara_decision_secs == 0 {
            return Err("Timeouts must be at least one second".to_string());
        }

        if self.max_inactivity == 0 {
            return Err("Max inactivity must be at least 1".to_string());
        }

        Ok(())
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            max_players: self.max_players,
            max_inactivity: self.max_inactivity,
        }
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn svara_decision_timeout(&self) -> Duration {
        Duration::from_secs(self.svara_decision_secs)
    }

    pub fn showdown_delay(&self) -> Duration {
        Duration::from_millis(self.showdown_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RoomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.turn_timeout(), Duration::from_secs(15));
        assert_eq!(config.svara_decision_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_rejects_too_many_seats() {
        let config = RoomConfig {
            max_players: 11,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_fractional_cents() {
        let config = RoomConfig {
            min_bet: Decimal::new(1005, 3),
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RoomConfig =
            serde_json::from_str(r#"{"name":"High stakes","min_bet":"50"}"#).expect("parse");
        assert_eq!(config.min_bet, Decimal::from(50));
        assert_eq!(config.max_players, MAX_PLAYERS);
    }
}
