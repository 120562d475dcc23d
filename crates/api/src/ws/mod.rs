//! WebSocket infrastructure for the live-session endpoints.
//!
//! Provides the per-endpoint session registry, the inbound command router,
//! heartbeat pings, and the HTTP upgrade handlers used by Axum routes.

pub mod commands;
mod handler;
mod heartbeat;
pub mod manager;

pub use commands::{CommandError, CommandRouter};
pub use handler::{analysis_ws_handler, curation_ws_handler, visualization_ws_handler};
pub use heartbeat::start_heartbeat;
pub use manager::SessionRegistry;
