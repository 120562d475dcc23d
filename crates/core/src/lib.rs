//! Shared domain vocabulary for the analysis backend.
//!
//! Identifiers, lifecycle enums, outbound message names and the
//! domain-level error type. Nothing in here performs I/O.

pub mod analysis;
pub mod error;
pub mod job_events;
pub mod types;
