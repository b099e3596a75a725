//! HTTP and WebSocket front end for Svara rooms.
//!
//! The binary in `main.rs` wires these modules together. They live in a
//! library so the router can be driven from tests.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
