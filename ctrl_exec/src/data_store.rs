//! # Data Store
//!
//! The shared state of the control pipeline. Each quantity lives in its own `Slot`, which is an
//! independently locked cell. A slot is only ever locked for the duration of a single copy in or
//! out, and no method touches more than one slot, so critical sections never nest and the store
//! cannot deadlock.
//!
//! Readers that need several related quantities read each slot separately and compose the result
//! from their local copies.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError};

use nalgebra::{Vector2, Vector3};
use serde::Serialize;

use crate::plant::output_point;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// One of the two tracked output axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single independently locked value.
///
/// Values are `Copy` and are always replaced whole, so a reader sees either the complete previous
/// value or the complete new one. For the same reason a poisoned lock still holds a complete value
/// and is recovered rather than propagated.
#[derive(Debug)]
pub struct Slot<T: Copy> {
    value: Mutex<T>,
}

/// Proportional tracking gains, one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gains {
    pub alpha_1: f64,
    pub alpha_2: f64,
}

/// Shared state for all tasks of a run.
///
/// Created once at startup, shared between tasks behind an `Arc`, and dropped once every task has
/// been joined.
#[derive(Debug)]
pub struct DataStore {
    /// Simulated time elapsed since the start of the run. Only advanced by the plant.
    ///
    /// Units: seconds
    pub sim_time_s: Slot<f64>,

    /// Robot pose `[x, y, theta]`.
    ///
    /// Units: meters, meters, radians
    pub state: Slot<Vector3<f64>>,

    /// Sensed output, the point offset from the robot centre along the heading.
    ///
    /// Units: meters
    pub output: Slot<Vector2<f64>>,

    /// Reference trajectory point `[xref, yref]`.
    ///
    /// Units: meters
    pub reference: Slot<Vector2<f64>>,

    /// Reference model output, one slot per axis so each axis has a single writer.
    pub ref_model_output: [Slot<f64>; 2],

    /// Reference model derivative, one slot per axis.
    pub ref_model_deriv: [Slot<f64>; 2],

    /// Virtual control command produced by the controller.
    pub lin_input: Slot<Vector2<f64>>,

    /// Physical command `[v, omega]` applied to the plant.
    ///
    /// Units: meters/second, radians/second
    pub plant_input: Slot<Vector2<f64>>,

    /// Controller gains, written by the tuning interface.
    pub gains: Slot<Gains>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Axis {
    /// Both axes in pipeline order.
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    /// Index of the axis into 2-element vectors.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

impl<T: Copy> Slot<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Copy the current value out of the slot.
    pub fn read(&self) -> T {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value held in the slot.
    pub fn write(&self, value: T) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl Gains {
    pub fn new(alpha_1: f64, alpha_2: f64) -> Self {
        Self { alpha_1, alpha_2 }
    }

    /// Gain applied to the given axis.
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.alpha_1,
            Axis::Y => self.alpha_2,
        }
    }
}

impl DataStore {
    /// Create the store for a new run.
    ///
    /// The output is computed from the initial state and the reference model starts on the
    /// initial output, so the controller sees no tracking error before the first reference
    /// sample arrives.
    pub fn new(init_state: Vector3<f64>, init_gains: Gains, offset_m: f64) -> Self {
        let output = output_point(&init_state, offset_m);

        Self {
            sim_time_s: Slot::new(0.0),
            state: Slot::new(init_state),
            output: Slot::new(output),
            reference: Slot::new(output),
            ref_model_output: [Slot::new(output[0]), Slot::new(output[1])],
            ref_model_deriv: [Slot::new(0.0), Slot::new(0.0)],
            lin_input: Slot::new(Vector2::zeros()),
            plant_input: Slot::new(Vector2::zeros()),
            gains: Slot::new(init_gains),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_store() {
        let ds = DataStore::new(Vector3::new(1.0, 2.0, 0.0), Gains::new(3.0, 4.0), 0.3);

        assert_eq!(ds.sim_time_s.read(), 0.0);
        assert!((ds.output.read() - Vector2::new(1.3, 2.0)).norm() < 1e-12);
        assert!((ds.ref_model_output[0].read() - 1.3).abs() < 1e-12);
        assert!((ds.ref_model_output[1].read() - 2.0).abs() < 1e-12);
        assert_eq!(ds.plant_input.read(), Vector2::zeros());
        assert_eq!(ds.gains.read().get(Axis::Y), 4.0);
    }

    #[test]
    fn test_slot_read_write() {
        let slot = Slot::new(Vector2::new(1.0, 2.0));
        slot.write(Vector2::new(3.0, 4.0));
        assert_eq!(slot.read(), Vector2::new(3.0, 4.0));
    }

    #[test]
    fn test_poisoned_slot_recovers() {
        let slot = Arc::new(Slot::new(1.0f64));

        let s = slot.clone();
        let res = thread::spawn(move || {
            let _guard = s.value.lock().unwrap();
            panic!("poison the slot");
        })
        .join();
        assert!(res.is_err());

        assert_eq!(slot.read(), 1.0);
        slot.write(2.0);
        assert_eq!(slot.read(), 2.0);
    }

    /// Several readers run against one writer which always writes vectors with all elements
    /// equal, any reader seeing mixed elements has observed a torn write.
    #[test]
    fn test_no_torn_reads() {
        const NUM_READERS: usize = 4;
        const NUM_WRITES: u64 = 20_000;

        let slot = Arc::new(Slot::new(Vector3::new(0.0, 0.0, 0.0)));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..NUM_READERS)
            .map(|_| {
                let slot = slot.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0u64;
                    loop {
                        let v = slot.read();
                        assert_eq!(v[0], v[1]);
                        assert_eq!(v[1], v[2]);
                        reads += 1;

                        if done.load(Ordering::Relaxed) {
                            break reads;
                        }
                    }
                })
            })
            .collect();

        for k in 1..=NUM_WRITES {
            let x = k as f64;
            slot.write(Vector3::new(x, x, x));
        }
        done.store(true, Ordering::Relaxed);

        for r in readers {
            assert!(r.join().unwrap() > 0);
        }
        let last = NUM_WRITES as f64;
        assert_eq!(slot.read(), Vector3::new(last, last, last));
    }
}
