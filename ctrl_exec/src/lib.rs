//! # Control library.
//!
//! This library allows the executable, tests and benches to access the stages and runtime of the
//! multi-rate control pipeline.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Controller - pole placement tracking law on the output point
pub mod controller;

/// Data store - independently locked slots shared between tasks
pub mod data_store;

/// Linearizer - feedback linearization of the unicycle
pub mod linearizer;

/// Executable parameters
pub mod params;

/// Pipeline - wires the stages into periodic tasks
pub mod pipeline;

/// Plant - unicycle kinematics integrated with forward Euler
pub mod plant;

/// Reference generator - circular trajectory which reverses direction
pub mod ref_gen;

/// Reference model - first order model smoothing the reference per axis
pub mod ref_model;

/// Periodic task runtime
pub mod task;

/// Telemetry - per-task jitter statistics and the simulation output log
pub mod telemetry;

/// Online gain tuning from the keyboard
pub mod tuning;
