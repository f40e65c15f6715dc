//! # Reference Model
//!
//! First order low-pass filter of one axis of the reference, `ym_dot = alpha * (ref - ym)`,
//! integrated with forward-Euler using the owning task's period as the step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;
use util::{maths::euler_step, module::State};

use crate::data_store::Axis;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Reference model state for a single axis.
#[derive(Debug)]
pub struct RefModel {
    axis: Axis,
    period_s: f64,
}

/// Input data to the reference model.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Reference value on this axis.
    pub reference: f64,

    /// Current model output.
    pub ym: f64,

    /// Gain of this axis.
    pub alpha: f64,
}

/// Output of one filter step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputData {
    /// Filtered reference after the step.
    pub ym: f64,

    /// Derivative of the filtered reference at the start of the step.
    pub ym_dot: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RefModelError {
    #[error("Reference model step must be strictly positive, found {0} s")]
    InvalidPeriod(f64),

    #[error("Reference model of axis {0:?} produced a non-finite output")]
    NonFinite(Axis),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RefModel {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            period_s: 0.0,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl State for RefModel {
    /// Step size in seconds.
    type InitData = f64;
    type InitError = RefModelError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = ();
    type ProcError = RefModelError;

    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if !(init_data > 0.0) {
            return Err(RefModelError::InvalidPeriod(init_data));
        }

        self.period_s = init_data;
        Ok(())
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let out = ref_model_step(
            input_data.ym,
            input_data.reference,
            input_data.alpha,
            self.period_s,
        );

        if !(out.ym.is_finite() && out.ym_dot.is_finite()) {
            return Err(RefModelError::NonFinite(self.axis));
        }

        Ok((out, ()))
    }
}

/// One forward-Euler step of the reference model.
///
/// `ym(t + P) = ym(t) + P * alpha * (ref(t) - ym(t))`
pub fn ref_model_step(ym: f64, reference: f64, alpha: f64, period_s: f64) -> OutputData {
    let ym_dot = alpha * (reference - ym);

    OutputData {
        ym: euler_step(ym, ym_dot, period_s),
        ym_dot,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_matches_closed_form() {
        for &(ym, r, alpha, p) in [
            (0.0, 1.0, 3.0, 0.05),
            (2.0, -1.0, 0.1, 0.01),
            (-0.7, 0.3, 12.5, 0.1),
        ]
        .iter()
        {
            let out = ref_model_step(ym, r, alpha, p);
            assert!((out.ym - (ym + p * alpha * (r - ym))).abs() < 1e-12);
            assert!((out.ym_dot - alpha * (r - ym)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_reference_two_steps() {
        let mut rm = RefModel::new(Axis::X);
        rm.init(0.05).unwrap();

        let mut input = InputData {
            reference: 1.0,
            ym: 0.0,
            alpha: 3.0,
        };

        let (out, _) = rm.proc(&input).unwrap();
        assert!((out.ym - 0.15).abs() < 1e-12);

        input.ym = out.ym;
        let (out, _) = rm.proc(&input).unwrap();
        assert!((out.ym - 0.2775).abs() < 1e-12);
        assert!((out.ym_dot - 2.55).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_period() {
        let mut rm = RefModel::new(Axis::Y);
        assert!(rm.init(0.0).is_err());
        assert!(rm.init(-0.01).is_err());
        assert_eq!(rm.axis(), Axis::Y);
    }
}
