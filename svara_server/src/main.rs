//! Multi-room Svara server using the async actor model.
//!
//! Each room runs as its own actor managed by a RoomManager. Balances come
//! from PostgreSQL when a database is configured, otherwise from an
//! in-memory ledger that opens every account with `DEFAULT_BALANCE`.

use std::sync::Arc;

use anyhow::Error;
use log::{error, info};
use pico_args::Arguments;
use svara::{
    db::Database,
    ledger::{Ledger, MemoryLedger},
    room::{RoomConfig, RoomManager},
    store::MemoryStore,
};
use svara_server::{
    api,
    config::{Overrides, ServerConfig},
    logging, metrics,
};

const HELP: &str = "\
Run a multi-room Svara server

USAGE:
  svara_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL, in-memory ledger if unset]
  --rooms      N           Number of rooms to create   [default: env ROOM_COUNT or 1]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus scrape address (disabled if unset)
  DATABASE_URL             PostgreSQL connection string
  DEFAULT_BALANCE          Opening balance for the in-memory ledger [default: 1000]
  ROOM_MIN_BET             Ante and minimum raise [default: 10]
  ROOM_MAX_PLAYERS         Seats per room, 2 to 10 [default: 10]
  TURN_TIMEOUT_SECS        Seconds to act before being folded [default: 15]
  Also: ROOM_COUNT, ROOM_NAME, SVARA_DECISION_SECS, SHOWDOWN_DELAY_MS,
  RESTART_DELAY_MS, MAX_INACTIVITY and DB_* pool settings. A .env file is
  read if present.
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        room_count: pargs.opt_value_from_str("--rooms")?,
    };

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    logging::init();
    info!("Starting multi-room Svara server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics on http://{}/metrics", addr);
    }

    let (ledger, database): (Arc<dyn Ledger>, Option<Database>) = match &config.database {
        Some(db_config) => {
            info!("Connecting to database: {}", db_config.database_url);
            let db = Database::connect(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            let ledger = db
                .ledger()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to prepare ledger tables: {}", e))?;
            info!("Database connected successfully");
            (Arc::new(ledger), Some(db))
        }
        None => {
            info!(
                "No DATABASE_URL set, using in-memory ledger with ${} per account",
                config.default_balance
            );
            let ledger = MemoryLedger::with_default_balance(config.default_balance);
            (Arc::new(ledger), None)
        }
    };

    let manager = Arc::new(RoomManager::new(Arc::new(MemoryStore::new()), ledger));

    info!("Creating {} initial room(s)...", config.room_count);
    for i in 0..config.room_count {
        let room_config = RoomConfig {
            name: format!("{} {}", config.room_defaults.name, i + 1),
            ..config.room_defaults.clone()
        };

        match manager.create_room(room_config).await {
            Ok(room_id) => info!("Created room {} with ID {}", i + 1, room_id),
            Err(e) => error!("Failed to create room {}: {}", i + 1, e),
        }
    }

    let active_count = manager.active_room_count().await;
    metrics::active_rooms(active_count);
    info!("Server ready with {} active room(s)", active_count);
    for room in manager.list_rooms().await {
        info!(
            "  - {} (ID: {}) - {}/{} players, min bet: {}",
            room.name,
            room.id,
            room.members.len(),
            room.max_players,
            room.min_bet
        );
    }

    let app = api::create_router(api::AppState {
        manager,
        database: database.clone(),
    });

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
}
