//! Ledger error types.

use thiserror::Error;

use crate::{db::timeouts::TimeoutError, game::entities::PlayerId};

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Account not found
    #[error("Account not found for player {0}")]
    AccountNotFound(PlayerId),

    /// Balances can't go below zero
    #[error("Negative balance for player {player_id}: {balance}")]
    NegativeBalance {
        player_id: PlayerId,
        balance: rust_decimal::Decimal,
    },

    /// Query took too long
    #[error("Ledger operation timed out")]
    Timeout,
}

impl From<TimeoutError> for LedgerError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => Self::Timeout,
            TimeoutError::Database(e) => Self::Database(e),
        }
    }
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) => "Internal server error".to_string(),
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::NegativeBalance { .. } => "Invalid balance".to_string(),
            LedgerError::Timeout => "Server busy, try again".to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Database(_) | LedgerError::Timeout)
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_client_message_hides_ids() {
        let err = LedgerError::AccountNotFound(42);
        assert!(!err.client_message().contains("42"));
        let err = LedgerError::NegativeBalance {
            player_id: 7,
            balance: Decimal::new(-100, 2),
        };
        assert_eq!(err.client_message(), "Invalid balance");
    }

    #[test]
    fn test_timeouts_are_retryable() {
        assert!(LedgerError::Timeout.is_retryable());
        assert!(!LedgerError::AccountNotFound(1).is_retryable());
    }
}
