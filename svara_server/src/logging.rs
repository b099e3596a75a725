//! Structured logging configuration.
//!
//! The engine logs through the `log` facade. `init` installs a `tracing`
//! subscriber that also captures those records.

use svara::{PlayerId, RoomId};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use svara_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a player command the room refused
pub fn log_command_rejected(room_id: RoomId, player_id: PlayerId, reason: &str) {
    tracing::debug!(
        room_id = room_id,
        player_id = player_id,
        reason = reason,
        "Command rejected"
    );
}

/// Log how long a room took to answer a command
///
/// Anything slower than a second is reported as a warning.
pub fn log_performance(operation: &str, duration_ms: u64, room_id: RoomId) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            room_id = room_id,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::trace!(
            operation = operation,
            duration_ms = duration_ms,
            room_id = room_id,
            "Performance metric"
        );
    }
}
