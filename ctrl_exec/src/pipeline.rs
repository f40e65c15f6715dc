//! # Pipeline
//!
//! Builds the task set for a pipeline variant. Data flows through the data store:
//!
//! ```text
//! ref_gen -> ref_model -> controller -> linearizer -> plant
//!                              ^                        |
//!                              +------- output ---------+
//! ```
//!
//! Each task reads its inputs one slot at a time, processes its stage outside of any lock, and
//! writes its outputs one slot at a time. A stage error skips that period's write so the previous
//! value is kept. The logger task samples the store and handles tuning key presses.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, warn};
use nalgebra::Vector2;
use thiserror::Error;
use util::module::State;

use crate::{
    controller::{self, Controller},
    data_store::{Axis, DataStore},
    linearizer::{self, Linearizer, LinearizerInitError},
    params::{CtrlExecParams, PipelineVariant},
    plant::{self, Plant, PlantError},
    ref_gen::{self, RefGen, RefGenError},
    ref_model::{self, RefModel, RefModelError},
    task::TaskSpec,
    telemetry::SimLogger,
    tuning::Tuner,
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not initialise the reference generator: {0}")]
    RefGenInit(RefGenError),

    #[error("Could not initialise the reference model: {0}")]
    RefModelInit(RefModelError),

    #[error("Could not initialise the linearizer: {0}")]
    LinearizerInit(LinearizerInitError),

    #[error("Could not initialise the plant: {0}")]
    PlantInit(PlantError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the tasks of the given variant in pipeline order, upstream first, logger last.
pub fn build(
    params: &CtrlExecParams,
    ds: &Arc<DataStore>,
    sim_logger: SimLogger,
    tuner: Option<Tuner>,
) -> Result<Vec<TaskSpec>, PipelineError> {
    let periods = &params.periods_ms;
    let mut tasks = Vec::with_capacity(params.pipeline.num_tasks());

    tasks.push(TaskSpec {
        name: String::from("ref_gen"),
        period_ms: periods.ref_gen,
        body: ref_gen_body(params, ds.clone())?,
    });

    match params.pipeline {
        PipelineVariant::JointRefModel => tasks.push(TaskSpec {
            name: String::from("ref_model"),
            period_ms: periods.ref_model,
            body: ref_model_body(&Axis::ALL, periods.ref_model, ds.clone())?,
        }),
        PipelineVariant::SplitRefModel => {
            for &(axis, name) in [(Axis::X, "ref_model_x"), (Axis::Y, "ref_model_y")].iter() {
                tasks.push(TaskSpec {
                    name: String::from(name),
                    period_ms: periods.ref_model,
                    body: ref_model_body(&[axis], periods.ref_model, ds.clone())?,
                });
            }
        }
    }

    tasks.push(TaskSpec {
        name: String::from("controller"),
        period_ms: periods.controller,
        body: controller_body(ds.clone()),
    });

    tasks.push(TaskSpec {
        name: String::from("linearizer"),
        period_ms: periods.linearizer,
        body: linearizer_body(params.offset_m(), ds.clone())?,
    });

    tasks.push(TaskSpec {
        name: String::from("plant"),
        period_ms: periods.plant,
        body: plant_body(periods.plant * 1e-3, params.offset_m(), ds.clone())?,
    });

    tasks.push(TaskSpec {
        name: String::from("logger"),
        period_ms: periods.logger,
        body: logger_body(sim_logger, tuner, ds.clone()),
    });

    Ok(tasks)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn ref_gen_body(
    params: &CtrlExecParams,
    ds: Arc<DataStore>,
) -> Result<Box<dyn FnMut() + Send>, PipelineError> {
    let mut rg = RefGen::default();
    rg.init(ref_gen::Params {
        amplitude_m: params.ref_amplitude_m,
        angular_freq_rads: params.ref_angular_freq_rads,
        reversal_time_s: params.ref_reversal_time_s,
    })
    .map_err(PipelineError::RefGenInit)?;

    let mut reversed = false;

    Ok(Box::new(move || {
        let input = ref_gen::InputData {
            sim_time_s: ds.sim_time_s.read(),
        };

        match rg.proc(&input) {
            Ok((reference, rpt)) => {
                ds.reference.write(reference);

                if rpt.reversed && !reversed {
                    debug!("Reference reversed direction at t = {:.3} s", input.sim_time_s);
                    reversed = true;
                }
            }
            Err(e) => warn!("Reference not updated: {}", e),
        }
    }))
}

fn ref_model_body(
    axes: &[Axis],
    period_ms: f64,
    ds: Arc<DataStore>,
) -> Result<Box<dyn FnMut() + Send>, PipelineError> {
    let mut models = Vec::with_capacity(axes.len());
    for &axis in axes {
        let mut rm = RefModel::new(axis);
        rm.init(period_ms * 1e-3).map_err(PipelineError::RefModelInit)?;
        models.push(rm);
    }

    Ok(Box::new(move || {
        for rm in models.iter_mut() {
            let axis = rm.axis();
            let i = axis.index();

            let input = ref_model::InputData {
                reference: ds.reference.read()[i],
                ym: ds.ref_model_output[i].read(),
                alpha: ds.gains.read().get(axis),
            };

            match rm.proc(&input) {
                Ok((out, _)) => {
                    ds.ref_model_output[i].write(out.ym);
                    ds.ref_model_deriv[i].write(out.ym_dot);
                }
                Err(e) => warn!("Reference model not updated: {}", e),
            }
        }
    }))
}

fn controller_body(ds: Arc<DataStore>) -> Box<dyn FnMut() + Send> {
    let mut ctrl = Controller::default();
    match ctrl.init(()) {
        Ok(()) => (),
        Err(e) => match e {},
    }

    Box::new(move || {
        let input = controller::InputData {
            output: ds.output.read(),
            ym: Vector2::new(ds.ref_model_output[0].read(), ds.ref_model_output[1].read()),
            ym_dot: Vector2::new(ds.ref_model_deriv[0].read(), ds.ref_model_deriv[1].read()),
            gains: ds.gains.read(),
        };

        match ctrl.proc(&input) {
            Ok((v, _)) => ds.lin_input.write(v),
            Err(e) => match e {},
        }
    })
}

fn linearizer_body(
    offset_m: f64,
    ds: Arc<DataStore>,
) -> Result<Box<dyn FnMut() + Send>, PipelineError> {
    let mut lin = Linearizer::default();
    lin.init(offset_m).map_err(PipelineError::LinearizerInit)?;

    let mut num_skipped: u64 = 0;

    Ok(Box::new(move || {
        let input = linearizer::InputData {
            heading_rad: ds.state.read()[2],
            lin_input: ds.lin_input.read(),
        };

        match lin.proc(&input) {
            Ok((u, _)) => ds.plant_input.write(u),
            Err(e) => {
                num_skipped += 1;
                if num_skipped == 1 {
                    warn!("Keeping previous plant input: {}", e);
                } else {
                    debug!("Keeping previous plant input ({} skipped): {}", num_skipped, e);
                }
            }
        }
    }))
}

fn plant_body(
    step_s: f64,
    offset_m: f64,
    ds: Arc<DataStore>,
) -> Result<Box<dyn FnMut() + Send>, PipelineError> {
    let mut plant = Plant::default();
    plant
        .init(plant::Params { step_s, offset_m })
        .map_err(PipelineError::PlantInit)?;

    Ok(Box::new(move || {
        let input = plant::InputData {
            state: ds.state.read(),
            plant_input: ds.plant_input.read(),
        };

        match plant.proc(&input) {
            Ok((out, _)) => {
                ds.state.write(out.state);
                ds.output.write(out.output);
            }
            Err(e) => warn!("Plant state not updated: {}", e),
        }

        // The clock is the time base of the run and advances even if the step failed
        let t = ds.sim_time_s.read();
        ds.sim_time_s.write(t + plant.step_s());
    }))
}

fn logger_body(
    mut sim_logger: SimLogger,
    mut tuner: Option<Tuner>,
    ds: Arc<DataStore>,
) -> Box<dyn FnMut() + Send> {
    Box::new(move || {
        sim_logger.log(&ds);

        if let Some(ref mut t) = tuner {
            t.poll(&ds);
        }
    })
}
