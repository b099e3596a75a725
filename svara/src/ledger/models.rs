//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::entities::{PlayerId, Usd};

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub player_id: PlayerId,
    pub balance: Usd,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded balance write. The idempotency key is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: i64,
    pub player_id: PlayerId,
    pub balance_before: Usd,
    pub balance_after: Usd,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl BalanceEntry {
    /// Signed change this entry made to the account.
    pub fn delta(&self) -> Usd {
        self.balance_after - self.balance_before
    }
}
