//! Observability
//!
//! Structured lifecycle events and process-wide context counters.

pub mod events;
pub mod metrics;
