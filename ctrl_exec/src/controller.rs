//! # Tracking Controller
//!
//! Feedback linearising tracking law, per axis `v_i = ym_dot_i + alpha_i * (ym_i - y_i)`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::convert::Infallible;

use nalgebra::Vector2;
use serde::Serialize;
use util::module::State;

use crate::data_store::{Axis, Gains};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Controller;

/// Input data to the controller, copied out of the data store one slot at a time.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    pub output: Vector2<f64>,
    pub ym: Vector2<f64>,
    pub ym_dot: Vector2<f64>,
    pub gains: Gains,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusReport {
    /// `ym - y` on each axis.
    ///
    /// Units: meters
    pub tracking_error_m: [f64; 2],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for Controller {
    type InitData = ();
    type InitError = Infallible;

    type InputData = InputData;
    type OutputData = Vector2<f64>;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    fn init(&mut self, _init_data: Self::InitData) -> Result<(), Self::InitError> {
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let mut v = Vector2::zeros();
        let mut report = StatusReport::default();

        for &axis in Axis::ALL.iter() {
            let i = axis.index();
            let error = input_data.ym[i] - input_data.output[i];

            v[i] = input_data.ym_dot[i] + input_data.gains.get(axis) * error;
            report.tracking_error_m[i] = error;
        }

        Ok((v, report))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_control_law() {
        let mut ctrl = Controller::default();
        ctrl.init(()).unwrap();

        let input = InputData {
            output: Vector2::new(1.0, -1.0),
            ym: Vector2::new(1.5, 0.0),
            ym_dot: Vector2::new(0.2, -0.3),
            gains: Gains::new(2.0, 4.0),
        };

        let (v, rpt) = ctrl.proc(&input).unwrap();
        assert!((v[0] - (0.2 + 2.0 * 0.5)).abs() < 1e-12);
        assert!((v[1] - (-0.3 + 4.0 * 1.0)).abs() < 1e-12);
        assert_eq!(rpt.tracking_error_m, [0.5, 1.0]);
    }

    #[test]
    fn test_zero_error_passes_feedforward() {
        let mut ctrl = Controller::default();
        let input = InputData {
            output: Vector2::new(0.3, 0.7),
            ym: Vector2::new(0.3, 0.7),
            ym_dot: Vector2::new(1.0, 2.0),
            gains: Gains::new(3.0, 3.0),
        };

        let (v, _) = ctrl.proc(&input).unwrap();
        assert_eq!(v, Vector2::new(1.0, 2.0));
    }
}
