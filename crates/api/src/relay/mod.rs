//! Relays from the message bus into the platform.

pub mod visualization;

pub use visualization::{RelayError, VisualizationRelay};
