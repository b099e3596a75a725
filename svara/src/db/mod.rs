//! PostgreSQL connection pool behind the ledger.
//!
//! Rooms never touch the database themselves. They see it only through the
//! [`PgLedger`](crate::ledger::PgLedger) opened with [`Database::ledger`].

use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::ledger::{LedgerResult, PgLedger};

pub mod config;
pub mod timeouts;

pub use config::{DatabaseConfig, DatabaseConfigError};
use timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};

/// Pool state reported by the health endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct PoolHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    pub connections: u32,
    pub idle: usize,
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool and wait for the first connection.
    ///
    /// ```no_run
    /// use svara::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    ///     let ledger = db.ledger().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config).connect(&config.database_url).await?;
        Ok(Self { pool })
    }

    /// Build the pool without connecting. The first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config).connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open the ledger on this pool, creating its tables on first use.
    pub async fn ledger(&self) -> LedgerResult<PgLedger> {
        let ledger = PgLedger::new(Arc::new(self.pool.clone()));
        ledger.migrate().await?;
        Ok(ledger)
    }

    /// Round-trip a trivial query, bounded by the default query timeout.
    pub async fn health(&self) -> PoolHealth {
        let started = Instant::now();
        let result = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await;
        if let Err(e) = &result {
            log::warn!("Database health check failed: {e}");
        }

        PoolHealth {
            healthy: result.is_ok(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            connections: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
}
