//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use rust_decimal::Decimal;
use std::net::SocketAddr;
use svara::{
    MAX_PLAYERS, Usd,
    db::{DatabaseConfig, DatabaseConfigError},
    room::RoomConfig,
};

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// PostgreSQL ledger. `None` runs on an in-memory ledger.
    pub database: Option<DatabaseConfig>,
    /// Opening balance of every account in the in-memory ledger
    pub default_balance: Usd,
    /// Settings of the rooms opened at startup
    pub room_defaults: RoomConfig,
    /// Number of rooms to create on startup
    pub room_count: usize,
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub room_count: Option<usize>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but doesn't parse
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env("SERVER_BIND")?.unwrap_or_else(default_bind),
        };

        let metrics_bind = parse_env("METRICS_BIND")?;

        let database = match overrides
            .database_url
            .or_else(|| std::env::var("DATABASE_URL").ok())
        {
            Some(database_url) => Some(DatabaseConfig::with_url(database_url)?),
            None => None,
        };

        let defaults = RoomConfig::default();
        let room_defaults = RoomConfig {
            name: std::env::var("ROOM_NAME").unwrap_or(defaults.name),
            max_players: parse_env_or("ROOM_MAX_PLAYERS", defaults.max_players)?,
            min_bet: parse_env_or("ROOM_MIN_BET", defaults.min_bet)?,
            turn_timeout_secs: parse_env_or("TURN_TIMEOUT_SECS", defaults.turn_timeout_secs)?,
            svara_decision_secs: parse_env_or(
                "SVARA_DECISION_SECS",
                defaults.svara_decision_secs,
            )?,
            showdown_delay_ms: parse_env_or("SHOWDOWN_DELAY_MS", defaults.showdown_delay_ms)?,
            restart_delay_ms: parse_env_or("RESTART_DELAY_MS", defaults.restart_delay_ms)?,
            max_inactivity: parse_env_or("MAX_INACTIVITY", defaults.max_inactivity)?,
        };

        let room_count = match overrides.room_count {
            Some(count) => count,
            None => parse_env_or("ROOM_COUNT", 1)?,
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            default_balance: parse_env_or("DEFAULT_BALANCE", Decimal::from(1000))?,
            room_defaults,
            room_count,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_balance < Decimal::ZERO {
            return Err(invalid("DEFAULT_BALANCE", "Must not be negative"));
        }

        if self.room_defaults.max_players > MAX_PLAYERS {
            return Err(invalid(
                "ROOM_MAX_PLAYERS",
                &format!("Must be at most {MAX_PLAYERS} (three cards each from a 32-card deck)"),
            ));
        }

        if let Some(database) = &self.database
            && database.min_connections > database.max_connections
        {
            return Err(invalid(
                "DB_MIN_CONNECTIONS",
                &format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    database.max_connections
                ),
            ));
        }

        self.room_defaults.validate().map_err(|reason| ConfigError::Invalid {
            var: "ROOM_*".to_string(),
            reason,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Database(#[from] DatabaseConfigError),

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an optional environment variable. Set but malformed is an error.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &format!("cannot parse '{value}'"))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    Ok(parse_env(key)?.unwrap_or(default))
}
