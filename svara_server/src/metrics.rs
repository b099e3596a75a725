//! Prometheus metrics for the game server.
//!
//! Metrics are exposed in Prometheus text format on their own listener when
//! `METRICS_BIND` is set. Without an installed recorder every helper here is
//! a no-op.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use svara_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connections_total();
//! metrics::commands_total("look", true);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Track open WebSocket connections. Pass `1` on connect and `-1` on
/// disconnect.
pub fn websocket_connections_active(delta: f64) {
    metrics::gauge!("websocket_connections_active").increment(delta);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Record a player command and whether the room accepted it.
pub fn commands_total(action: &str, accepted: bool) {
    metrics::counter!("commands_total",
        "action" => action.to_string(),
        "accepted" => accepted.to_string()
    )
    .increment(1);
}

/// Record how long a room took to answer a command, in milliseconds.
pub fn command_duration_ms(action: &str, duration_ms: f64) {
    metrics::histogram!("command_duration_ms",
        "action" => action.to_string()
    )
    .record(duration_ms);
}

/// Set current open rooms count.
pub fn active_rooms(count: usize) {
    metrics::gauge!("active_rooms").set(count as f64);
}
