//! # Plant Simulator
//!
//! Unicycle kinematics of the differential drive robot,
//!
//! ```text
//! x_dot = | cos(theta)  0 |
//!         | sin(theta)  0 | u
//!         | 0           1 |
//! ```
//!
//! integrated with forward-Euler. The sensed output is the point `r` ahead of the centre along
//! the heading.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3x2, Vector2, Vector3};
use thiserror::Error;
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Plant {
    params: Params,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Params {
    /// Integration step, also the amount the simulation clock advances each period.
    ///
    /// Units: seconds
    pub step_s: f64,

    /// Units: meters
    pub offset_m: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InputData {
    pub state: Vector3<f64>,
    pub plant_input: Vector2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputData {
    pub state: Vector3<f64>,
    pub output: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlantError {
    #[error("Plant step must be strictly positive, found {0} s")]
    InvalidStep(f64),

    #[error("Plant state is no longer finite: {0:?}")]
    NonFiniteState([f64; 3]),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Plant {
    pub fn step_s(&self) -> f64 {
        self.params.step_s
    }
}

impl State for Plant {
    type InitData = Params;
    type InitError = PlantError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = ();
    type ProcError = PlantError;

    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if !(init_data.step_s > 0.0) {
            return Err(PlantError::InvalidStep(init_data.step_s));
        }

        self.params = init_data;
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let state = integrate(&input_data.state, &input_data.plant_input, self.params.step_s);

        if !state.iter().all(|x| x.is_finite()) {
            return Err(PlantError::NonFiniteState([state[0], state[1], state[2]]));
        }

        Ok((
            OutputData {
                state,
                output: output_point(&state, self.params.offset_m),
            },
            (),
        ))
    }
}

/// One forward-Euler step of the unicycle kinematics.
#[rustfmt::skip]
pub fn integrate(state: &Vector3<f64>, plant_input: &Vector2<f64>, step_s: f64) -> Vector3<f64> {
    let (s, c) = state[2].sin_cos();

    let b = Matrix3x2::new(
        c,   0.0,
        s,   0.0,
        0.0, 1.0,
    );

    state + b * plant_input * step_s
}

/// Output point, `offset_m` ahead of the robot centre along the heading.
pub fn output_point(state: &Vector3<f64>, offset_m: f64) -> Vector2<f64> {
    let (s, c) = state[2].sin_cos();

    Vector2::new(state[0] + offset_m * c, state[1] + offset_m * s)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_zero_input_holds_state() {
        let mut plant = Plant::default();
        plant
            .init(Params {
                step_s: 0.01,
                offset_m: 0.3,
            })
            .unwrap();

        let state = Vector3::new(1.2, -0.4, 2.1);
        let (out, _) = plant
            .proc(&InputData {
                state,
                plant_input: Vector2::zeros(),
            })
            .unwrap();

        assert_eq!(out.state, state);
    }

    #[test]
    fn test_straight_and_turn() {
        // Driving forwards along +y
        let next = integrate(&Vector3::new(0.0, 0.0, FRAC_PI_2), &Vector2::new(2.0, 0.0), 0.1);
        assert!((next - Vector3::new(0.0, 0.2, FRAC_PI_2)).norm() < 1e-12);

        // Turning on the spot
        let next = integrate(&Vector3::new(1.0, 1.0, 0.0), &Vector2::new(0.0, 0.5), 0.1);
        assert!((next - Vector3::new(1.0, 1.0, 0.05)).norm() < 1e-12);
    }

    #[test]
    fn test_output_point() {
        let y = output_point(&Vector3::new(1.0, 2.0, FRAC_PI_2), 0.3);
        assert!((y - Vector2::new(1.0, 2.3)).norm() < 1e-12);
    }

    #[test]
    fn test_invalid_step() {
        let mut plant = Plant::default();
        assert!(plant
            .init(Params {
                step_s: 0.0,
                offset_m: 0.3
            })
            .is_err());
    }
}
