//! PostgreSQL ledger with per-write idempotency keys.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use super::{
    Ledger,
    errors::{LedgerError, LedgerResult},
    models::{Account, BalanceEntry},
};
use crate::{
    db::timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout},
    game::entities::{PlayerId, Usd, round_money},
};

/// Ledger manager
#[derive(Clone)]
pub struct PgLedger {
    pool: Arc<PgPool>,
}

impl PgLedger {
    /// Create a new ledger manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create the ledger tables if they don't exist yet.
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                player_id BIGINT PRIMARY KEY,
                balance NUMERIC(20, 2) NOT NULL CHECK (balance >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balance_entries (
                id BIGSERIAL PRIMARY KEY,
                player_id BIGINT NOT NULL REFERENCES accounts (player_id),
                balance_before NUMERIC(20, 2) NOT NULL,
                balance_after NUMERIC(20, 2) NOT NULL,
                idempotency_key TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Open an account, or leave an existing one untouched.
    pub async fn open_account(&self, player_id: PlayerId, balance: Usd) -> LedgerResult<()> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance { player_id, balance });
        }
        with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(
                "INSERT INTO accounts (player_id, balance)
                 VALUES ($1, $2)
                 ON CONFLICT (player_id) DO NOTHING",
            )
            .bind(player_id)
            .bind(round_money(balance))
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    /// Get account details for a player
    pub async fn get_account(&self, player_id: PlayerId) -> LedgerResult<Account> {
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(
                r#"
                SELECT player_id, balance, created_at, updated_at
                FROM accounts
                WHERE player_id = $1
                "#,
            )
            .bind(player_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or(LedgerError::AccountNotFound(player_id))?;

        Ok(Account {
            player_id: row.get("player_id"),
            balance: row.get("balance"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Most recent balance writes for a player, newest first.
    pub async fn get_entries(
        &self,
        player_id: PlayerId,
        limit: i64,
    ) -> LedgerResult<Vec<BalanceEntry>> {
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(
                r#"
                SELECT id, player_id, balance_before, balance_after, idempotency_key, created_at
                FROM balance_entries
                WHERE player_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(player_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BalanceEntry {
                id: row.get("id"),
                player_id: row.get("player_id"),
                balance_before: row.get("balance_before"),
                balance_after: row.get("balance_after"),
                idempotency_key: row.get("idempotency_key"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn write_balance(
        &self,
        player_id: PlayerId,
        balance: Usd,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;

        // Check for duplicate write (idempotency)
        let existing = sqlx::query("SELECT id FROM balance_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            log::debug!("Ledger write {idempotency_key} already applied");
            return Ok(());
        }

        let current = sqlx::query("SELECT balance FROM accounts WHERE player_id = $1 FOR UPDATE")
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::AccountNotFound(player_id))?;
        let balance_before: Usd = current.get("balance");

        sqlx::query(
            "UPDATE accounts
             SET balance = $1, updated_at = NOW()
             WHERE player_id = $2",
        )
        .bind(balance)
        .bind(player_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO balance_entries
                (player_id, balance_before, balance_after, idempotency_key)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(player_id)
        .bind(balance_before)
        .bind(balance)
        .bind(idempotency_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Usd> {
        Ok(self.get_account(player_id).await?.balance)
    }

    async fn set_balance(
        &self,
        player_id: PlayerId,
        balance: Usd,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        let balance = round_money(balance);
        if balance < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance { player_id, balance });
        }
        tokio::time::timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.write_balance(player_id, balance, idempotency_key),
        )
        .await
        .map_err(|_| LedgerError::Timeout)?
    }
}
