//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Matrix2;
use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Determinants with an absolute value below this are treated as singular.
pub const SINGULAR_DET_THRESHOLD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Limit a value so that it is never below `floor`.
pub fn clamp_floor<T>(value: T, floor: T) -> T
where
    T: Float
{
    if value < floor { floor } else { value }
}

/// Perform one forward-Euler integration step, `current + derivative * step`.
pub fn euler_step<T>(current: T, derivative: T, step: T) -> T
where
    T: Float
{
    current + derivative * step
}

/// Invert a 2x2 matrix, returning `None` if the matrix is singular.
///
/// The matrix is considered singular when the absolute value of its determinant is below
/// `SINGULAR_DET_THRESHOLD` or is not a number. An inverse with non-finite elements is rejected
/// too.
pub fn checked_inverse_2x2(matrix: &Matrix2<f64>) -> Option<Matrix2<f64>> {
    if !(matrix.determinant().abs() >= SINGULAR_DET_THRESHOLD) {
        return None;
    }

    matrix
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
}
