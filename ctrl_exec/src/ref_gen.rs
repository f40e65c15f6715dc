//! # Reference Generator
//!
//! Produces the circular reference trajectory the robot has to track. The circle is followed
//! anticlockwise until the reversal time and clockwise afterwards, so the reference stays
//! continuous in position and only its direction of travel flips.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;
use thiserror::Error;
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Reference generator module state
#[derive(Debug, Default)]
pub struct RefGen {
    params: Params,
}

/// Parameters of the reference trajectory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Params {
    /// Units: meters
    pub amplitude_m: f64,

    /// Units: radians/second
    pub angular_freq_rads: f64,

    /// Units: seconds
    pub reversal_time_s: f64,
}

/// Input data to the reference generator.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Units: seconds
    pub sim_time_s: f64,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusReport {
    /// True once the reference has reversed direction.
    pub reversed: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RefGenError {
    #[error("Simulation time is not finite: {0}")]
    NonFiniteTime(f64),

    #[error("Reference parameters must be finite")]
    NonFiniteParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for RefGen {
    type InitData = Params;
    type InitError = RefGenError;

    type InputData = InputData;
    type OutputData = Vector2<f64>;
    type StatusReport = StatusReport;
    type ProcError = RefGenError;

    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if !(init_data.amplitude_m.is_finite()
            && init_data.angular_freq_rads.is_finite()
            && init_data.reversal_time_s.is_finite())
        {
            return Err(RefGenError::NonFiniteParams);
        }

        self.params = init_data;
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let t = input_data.sim_time_s;
        if !t.is_finite() {
            return Err(RefGenError::NonFiniteTime(t));
        }

        Ok((
            reference_at(&self.params, t),
            StatusReport {
                reversed: t >= self.params.reversal_time_s,
            },
        ))
    }
}

/// Reference point at simulated time `t`.
pub fn reference_at(params: &Params, t: f64) -> Vector2<f64> {
    let phase = params.angular_freq_rads * t;
    let x = params.amplitude_m * phase.cos();
    let y = params.amplitude_m * phase.sin();

    if t < params.reversal_time_s {
        Vector2::new(x, y)
    } else {
        Vector2::new(x, -y)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn params() -> Params {
        Params {
            amplitude_m: 5.0 / PI,
            angular_freq_rads: 0.2 * PI,
            reversal_time_s: 10.0,
        }
    }

    #[test]
    fn test_reference_start() {
        let r = reference_at(&params(), 0.0);
        assert!((r[0] - 1.5915494309).abs() < 1e-9);
        assert!(r[1].abs() < 1e-12);
    }

    #[test]
    fn test_reference_reversal() {
        let p = params();

        // Same point either side of the boundary, the y direction of travel flips
        let at = reference_at(&p, 10.0);
        assert!((at[0] - 5.0 / PI).abs() < 1e-9);
        assert!(at[1].abs() < 1e-9);

        let before = reference_at(&p, 10.0 - 0.5);
        let after = reference_at(&p, 10.0 + 0.5);
        assert!(before[1] < 0.0);
        assert!(after[1] < 0.0);
        assert!((before[0] - after[0]).abs() < 1e-9);

        // Quarter turn in, the forward rule gives +y, the reversed rule gives -y
        let q = reference_at(&p, 2.5);
        let q_rev = reference_at(&p, 12.5);
        assert!(q[1] > 1.59);
        assert!(q_rev[1] < -1.59);
    }

    #[test]
    fn test_proc_reports_reversal() {
        let mut rg = RefGen::default();
        rg.init(params()).unwrap();

        let (_, rpt) = rg.proc(&InputData { sim_time_s: 9.99 }).unwrap();
        assert!(!rpt.reversed);
        let (_, rpt) = rg.proc(&InputData { sim_time_s: 10.0 }).unwrap();
        assert!(rpt.reversed);

        assert!(rg.proc(&InputData { sim_time_s: std::f64::NAN }).is_err());
    }
}
