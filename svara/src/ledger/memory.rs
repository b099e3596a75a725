//! In-process ledger used by tests and by the server when no database is
//! configured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::{
    Ledger,
    errors::{LedgerError, LedgerResult},
};
use crate::game::entities::{PlayerId, Usd, round_money};

#[derive(Default)]
struct Accounts {
    balances: HashMap<PlayerId, Usd>,
    applied_keys: HashSet<String>,
}

/// Ledger backed by a map. Unknown players are opened with
/// `default_balance` on first read.
pub struct MemoryLedger {
    accounts: RwLock<Accounts>,
    default_balance: Option<Usd>,
}

impl MemoryLedger {
    /// A ledger where unknown players don't exist.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Accounts::default()),
            default_balance: None,
        }
    }

    /// A ledger that opens an account with `balance` for anyone it hasn't
    /// seen before.
    pub fn with_default_balance(balance: Usd) -> Self {
        Self {
            accounts: RwLock::new(Accounts::default()),
            default_balance: Some(round_money(balance)),
        }
    }

    pub async fn deposit(&self, player_id: PlayerId, balance: Usd) {
        let mut accounts = self.accounts.write().await;
        accounts.balances.insert(player_id, round_money(balance));
    }

    /// Number of distinct writes applied.
    pub async fn applied_writes(&self) -> usize {
        self.accounts.read().await.applied_keys.len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Usd> {
        if let Some(balance) = self.accounts.read().await.balances.get(&player_id) {
            return Ok(*balance);
        }
        let balance = self
            .default_balance
            .ok_or(LedgerError::AccountNotFound(player_id))?;
        let mut accounts = self.accounts.write().await;
        Ok(*accounts.balances.entry(player_id).or_insert(balance))
    }

    async fn set_balance(
        &self,
        player_id: PlayerId,
        balance: Usd,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance { player_id, balance });
        }
        let mut accounts = self.accounts.write().await;
        if !accounts.applied_keys.insert(idempotency_key.to_string()) {
            log::debug!("Ledger write {idempotency_key} already applied");
            return Ok(());
        }
        accounts.balances.insert(player_id, round_money(balance));
        Ok(())
    }
}
