//! # Control Executable Parameters
//!
//! This module provide parameters for the control executable, loaded from a TOML file in the
//! `params` directory. Missing keys take their default values.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;
use util::rt::{FIFO_MAX_PRIORITY, FIFO_MIN_PRIORITY};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CtrlExecParams {
    /// Simulated time at which all tasks stop.
    ///
    /// Units: seconds
    pub sim_horizon_s: f64,

    /// Which pipeline layout to run.
    pub pipeline: PipelineVariant,

    /// Task periods.
    pub periods_ms: Periods,

    // ---- GEOMETRY ----

    /// Physical diameter of the robot, the output point sits half of this ahead of the centre.
    ///
    /// Units: meters
    pub robot_diameter_m: f64,

    /// Initial pose `[x, y, theta]`.
    ///
    /// Units: meters, meters, radians
    pub init_state: [f64; 3],

    // ---- GAINS ----

    /// Initial controller gains `[alpha_1, alpha_2]`.
    pub init_gains: [f64; 2],

    /// Amount a single key press changes a gain by.
    pub gain_step: f64,

    /// Lowest value a gain may take.
    pub gain_floor: f64,

    // ---- REFERENCE ----

    /// Radius of the reference circle.
    ///
    /// Units: meters
    pub ref_amplitude_m: f64,

    /// Angular frequency of the reference.
    ///
    /// Units: radians/second
    pub ref_angular_freq_rads: f64,

    /// Simulated time at which the reference reverses direction.
    ///
    /// Units: seconds
    pub ref_reversal_time_s: f64,

    // ---- RUNTIME ----

    /// Lock all process memory before scheduling starts.
    pub lock_memory: bool,

    /// Request FIFO real-time scheduling for the tasks.
    pub realtime: bool,

    /// Priority given to the highest rate task, others count down from here.
    pub rt_max_priority: i32,
}

/// Period of each task in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Periods {
    pub plant: f64,
    pub linearizer: f64,
    pub controller: f64,
    pub ref_model: f64,
    pub logger: f64,
    pub ref_gen: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Pipeline layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// One reference model task updates both axes.
    JointRefModel,

    /// Each axis of the reference model runs as its own task.
    SplitRefModel,
}

/// Problems found while validating parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Parameter `{0}` must be strictly positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Parameter `{0}` must be finite, found {1}")]
    NotFinite(&'static str, f64),

    #[error("Initial gain {0} is below the gain floor {1}")]
    GainBelowFloor(f64, f64),

    #[error(
        "Maximum priority {0} leaves no room for {1} distinct FIFO priorities (lowest allowed \
         is {2})"
    )]
    PriorityRange(i32, usize, i32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CtrlExecParams {
    fn default() -> Self {
        Self {
            sim_horizon_s: 20.0,
            pipeline: PipelineVariant::SplitRefModel,
            periods_ms: Periods::default(),
            robot_diameter_m: 0.6,
            init_state: [0.0, 0.0, 0.0],
            init_gains: [3.0, 3.0],
            gain_step: 0.1,
            gain_floor: 0.1,
            ref_amplitude_m: 5.0 / std::f64::consts::PI,
            ref_angular_freq_rads: 0.2 * std::f64::consts::PI,
            ref_reversal_time_s: 10.0,
            lock_memory: true,
            realtime: true,
            rt_max_priority: 80,
        }
    }
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            plant: 10.0,
            linearizer: 20.0,
            controller: 30.0,
            ref_model: 50.0,
            logger: 100.0,
            ref_gen: 120.0,
        }
    }
}

impl PipelineVariant {
    /// Number of tasks the variant runs, including the logger.
    pub fn num_tasks(self) -> usize {
        match self {
            PipelineVariant::JointRefModel => 6,
            PipelineVariant::SplitRefModel => 7,
        }
    }
}

impl CtrlExecParams {
    /// Offset of the output point from the robot centre, half the diameter.
    ///
    /// Units: meters
    pub fn offset_m(&self) -> f64 {
        self.robot_diameter_m / 2.0
    }

    /// Check that the parameters describe a runnable pipeline.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positives = [
            ("sim_horizon_s", self.sim_horizon_s),
            ("periods_ms.plant", self.periods_ms.plant),
            ("periods_ms.linearizer", self.periods_ms.linearizer),
            ("periods_ms.controller", self.periods_ms.controller),
            ("periods_ms.ref_model", self.periods_ms.ref_model),
            ("periods_ms.logger", self.periods_ms.logger),
            ("periods_ms.ref_gen", self.periods_ms.ref_gen),
            ("robot_diameter_m", self.robot_diameter_m),
            ("gain_step", self.gain_step),
            ("gain_floor", self.gain_floor),
        ];

        for &(name, value) in positives.iter() {
            // Written this way round so NaN is rejected too
            if !(value > 0.0) {
                return Err(ParamsError::NotPositive(name, value));
            }
        }

        let finites = [
            ("init_state[0]", self.init_state[0]),
            ("init_state[1]", self.init_state[1]),
            ("init_state[2]", self.init_state[2]),
            ("ref_amplitude_m", self.ref_amplitude_m),
            ("ref_angular_freq_rads", self.ref_angular_freq_rads),
            ("ref_reversal_time_s", self.ref_reversal_time_s),
        ];

        for &(name, value) in finites.iter() {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite(name, value));
            }
        }

        for &gain in self.init_gains.iter() {
            if !(gain >= self.gain_floor) {
                return Err(ParamsError::GainBelowFloor(gain, self.gain_floor));
            }
        }

        let num_tasks = self.pipeline.num_tasks();
        let lowest = self.rt_max_priority - (num_tasks as i32 - 1);
        if self.rt_max_priority > FIFO_MAX_PRIORITY || lowest < FIFO_MIN_PRIORITY {
            return Err(ParamsError::PriorityRange(
                self.rt_max_priority,
                num_tasks,
                FIFO_MIN_PRIORITY,
            ));
        }

        Ok(())
    }
}
