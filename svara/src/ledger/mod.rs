//! Ledger module: the account balances a room reads at seating and writes
//! back as hands settle.
//!
//! This module implements:
//! - The [`Ledger`] trait rooms talk to
//! - An in-memory ledger for tests and database-less deployments
//! - A PostgreSQL ledger with one entry row per write
//! - Idempotency keys so a replayed write never applies twice
//!
//! ## Example
//!
//! ```
//! use svara::ledger::{Ledger, MemoryLedger};
//! use rust_decimal::Decimal;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = MemoryLedger::new();
//! ledger.deposit(1, Decimal::from(100)).await;
//! ledger.set_balance(1, Decimal::from(90), "1:hand:1:settle:4").await?;
//! assert_eq!(ledger.get_balance(1).await?, Decimal::from(90));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::game::entities::{PlayerId, Usd};

pub mod errors;
pub mod manager;
pub mod memory;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::PgLedger;
pub use memory::MemoryLedger;
pub use models::{Account, BalanceEntry};

/// The account-balance service rooms depend on.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Usd>;

    /// Set an absolute balance. Replaying the same `idempotency_key` must
    /// succeed without changing anything.
    async fn set_balance(
        &self,
        player_id: PlayerId,
        balance: Usd,
        idempotency_key: &str,
    ) -> LedgerResult<()>;
}
