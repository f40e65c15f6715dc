//! # Timing & Telemetry
//!
//! Observability for the pipeline: per-task inter-wakeup statistics and the simulation output
//! log. Nothing in this module feeds back into control.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod jitter;
mod sim_logger;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use jitter::*;
pub use sim_logger::*;
