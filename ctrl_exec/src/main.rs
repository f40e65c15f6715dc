//! Main control executable entry point.
//!
//! # Architecture
//!
//! The executable simulates a unicycle robot tracking a reference trajectory, with each stage of
//! the control loop running as its own periodic task:
//!
//!     - Initialise session, logging and parameters
//!     - Build the data store with the initial pose and gains
//!     - Put the terminal into raw mode for gain tuning
//!     - Spawn the periodic tasks and wait for them to reach the simulation horizon
//!     - Report timing statistics and save them to the session
//!
//! # Usage
//!
//! `ctrl_exec [PARAMS_FILE]`
//!
//! `PARAMS_FILE` is relative to the `params` directory of the software root and defaults to
//! `ctrl_exec.toml`. While running, `q`/`a` raise/lower the x gain and `w`/`s` raise/lower the y gain.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::{env, sync::Arc};

// Internal
use ctrl_lib::{
    data_store::{DataStore, Gains},
    params::CtrlExecParams,
    pipeline,
    task::{self, RuntimeConfig},
    telemetry::{self, SimLogger},
    tuning::{RawTerminal, Tuner},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default parameter file, relative to the `params` directory.
const PARAMS_FILE: &str = "ctrl_exec.toml";

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("ctrl_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Multi-rate Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let params: CtrlExecParams = match args.len() {
        1 => util::params::load(PARAMS_FILE).wrap_err("Could not load exec params")?,
        2 => util::params::load(&args[1])
            .wrap_err_with(|| format!("Could not load exec params from \"{}\"", args[1]))?,
        _ => return Err(eyre!("Expected at most one argument (the parameter file name)")),
    };

    params.validate().wrap_err("Invalid exec params")?;

    info!("Exec parameters loaded: {:#?}", params);

    // ---- INITIALISE DATA STORE ----

    let ds = Arc::new(DataStore::new(
        Vector3::from(params.init_state),
        Gains::new(params.init_gains[0], params.init_gains[1]),
        params.offset_m(),
    ));

    // ---- INITIALISE TUNING ----

    let terminal = match RawTerminal::enable() {
        Ok(t) => {
            info!("Gain tuning enabled: q/a for alpha_1, w/s for alpha_2");
            Some(t)
        }
        Err(e) => {
            warn!("Gain tuning disabled: {}", e);
            None
        }
    };

    let tuner = terminal
        .as_ref()
        .map(|t| Tuner::new(t.key_reader(), params.gain_step, params.gain_floor));

    // ---- INITIALISE SIMULATION LOG ----

    let sim_logger = match SimLogger::new(&session.arch_root) {
        Ok(l) => l,
        Err(e) => {
            warn!("Simulation output will not be recorded: {}", e);
            SimLogger::disabled()
        }
    };

    // ---- BUILD AND RUN PIPELINE ----

    let tasks = pipeline::build(&params, &ds, sim_logger, tuner)
        .wrap_err("Failed to build the pipeline")?;

    info!(
        "Running {:?} pipeline with {} tasks until t = {} s\n",
        params.pipeline,
        tasks.len(),
        params.sim_horizon_s
    );

    let config = RuntimeConfig {
        horizon_s: params.sim_horizon_s,
        lock_memory: params.lock_memory,
        realtime: params.realtime,
        rt_max_priority: params.rt_max_priority,
        timing_dir: Some(session.arch_root.join("timing")),
    };

    let report = task::run(ds.clone(), tasks, &config).wrap_err("Pipeline failed to run")?;

    // ---- REPORT ----

    for t in report.tasks.iter() {
        info!(
            "{}: {} cycles, {} overruns, priority {} ({:?})",
            t.name, t.cycles, t.overruns, t.priority, t.timing
        );

        if let Some(ref jitter) = t.jitter {
            telemetry::log_summary(&t.name, jitter);
        }
    }

    let final_state = ds.state.read();
    let final_gains = ds.gains.read();
    info!(
        "Final state: x = {:.3} m, y = {:.3} m, theta = {:.3} rad",
        final_state[0], final_state[1], final_state[2]
    );
    info!(
        "Final gains: alpha_1 = {:.2}, alpha_2 = {:.2}",
        final_gains.alpha_1, final_gains.alpha_2
    );

    let panicked = report.panicked.clone();
    session.save("timing/summary.json", report);

    // ---- SHUTDOWN ----

    drop(terminal);

    info!("End of execution");
    session.exit();

    if !panicked.is_empty() {
        return Err(eyre!("Tasks panicked: {:?}", panicked));
    }

    Ok(())
}
