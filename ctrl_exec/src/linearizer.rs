//! # Input Linearizer
//!
//! Converts the controller's virtual command `v` into the physical command `u = [v, omega]` by
//! inverting the decoupling matrix
//!
//! ```text
//! L(theta) = | cos(theta)  -r sin(theta) |
//!            | sin(theta)   r cos(theta) |
//! ```
//!
//! where `r` is the offset of the output point. `det L = r`, so the matrix is only singular for a
//! zero offset, but the inverse is still checked every period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;
use util::{maths::checked_inverse_2x2, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Linearizer {
    offset_m: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Units: radians
    pub heading_rad: f64,

    /// Virtual command from the controller.
    pub lin_input: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LinearizerInitError {
    #[error("Output point offset must be strictly positive, found {0} m")]
    InvalidOffset(f64),
}

#[derive(Debug, Error)]
pub enum LinearizerError {
    #[error("Decoupling matrix is singular at heading {0} rad")]
    Singular(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for Linearizer {
    /// Output point offset in meters.
    type InitData = f64;
    type InitError = LinearizerInitError;

    type InputData = InputData;
    type OutputData = Vector2<f64>;
    type StatusReport = ();
    type ProcError = LinearizerError;

    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if !(init_data > 0.0) {
            return Err(LinearizerInitError::InvalidOffset(init_data));
        }

        self.offset_m = init_data;
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let l = decoupling_matrix(input_data.heading_rad, self.offset_m);

        let l_inv = checked_inverse_2x2(&l)
            .ok_or(LinearizerError::Singular(input_data.heading_rad))?;

        Ok((l_inv * input_data.lin_input, ()))
    }
}

/// Decoupling matrix `L(theta)` for an output point offset `offset_m` ahead of the centre.
#[rustfmt::skip]
pub fn decoupling_matrix(heading_rad: f64, offset_m: f64) -> Matrix2<f64> {
    let (s, c) = heading_rad.sin_cos();

    Matrix2::new(
        c, -offset_m * s,
        s,  offset_m * c,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heading_zero() {
        let l = decoupling_matrix(0.0, 0.3);
        assert!((l - Matrix2::new(1.0, 0.0, 0.0, 0.3)).norm() < 1e-12);

        let l_inv = checked_inverse_2x2(&l).unwrap();
        assert!((l_inv - Matrix2::new(1.0, 0.0, 0.0, 10.0 / 3.0)).norm() < 1e-12);

        let mut lin = Linearizer::default();
        lin.init(0.3).unwrap();
        let (u, _) = lin
            .proc(&InputData {
                heading_rad: 0.0,
                lin_input: Vector2::new(1.0, 2.0),
            })
            .unwrap();
        assert!((u - Vector2::new(1.0, 20.0 / 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        for i in 0..64 {
            let theta = -7.0 + 0.23 * i as f64;
            for &r in [0.05, 0.3, 1.0, 4.0].iter() {
                let l = decoupling_matrix(theta, r);
                let l_inv = checked_inverse_2x2(&l).unwrap();
                assert!((l * l_inv - Matrix2::identity()).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_offset_rejected() {
        let mut lin = Linearizer::default();
        assert!(lin.init(0.0).is_err());

        // Bypassing init leaves a zero offset, which must be reported rather than inverted
        let res = lin.proc(&InputData {
            heading_rad: 1.0,
            lin_input: Vector2::new(1.0, 1.0),
        });
        assert!(matches!(res, Err(LinearizerError::Singular(_))));
    }

    #[test]
    fn test_nan_heading_rejected() {
        let mut lin = Linearizer::default();
        lin.init(0.3).unwrap();

        let res = lin.proc(&InputData {
            heading_rad: std::f64::NAN,
            lin_input: Vector2::new(1.0, 2.0),
        });
        assert!(matches!(res, Err(LinearizerError::Singular(h)) if h.is_nan()));
    }
}
