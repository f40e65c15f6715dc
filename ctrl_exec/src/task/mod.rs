//! # Periodic Task Runtime
//!
//! Runs each pipeline function in its own thread at a fixed period:
//!
//! - Priorities follow the rate-monotonic policy, shorter periods run at higher FIFO priority and
//!   equal periods are ordered by pipeline position, upstream first.
//! - Wakeups are absolute. The next deadline is the previous deadline plus one period, never
//!   "now" plus one period, so execution jitter cannot accumulate into drift.
//! - All tasks stop once the simulation clock reaches the horizon. If any task panics a shared
//!   stop flag is raised and the remaining tasks stop at their next wakeup.
//! - Every task is joined before `run` returns.
//!
//! If real-time scheduling is unavailable the tasks fall back to ordinary threads sleeping with
//! `std::thread::sleep`, which keeps the pipeline correct but loosens its timing.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod runner;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::data_store::DataStore;
use crate::telemetry::JitterSummary;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Work executed once per period.
pub type TaskBody = Box<dyn FnMut() + Send + 'static>;

/// Description of one periodic task.
pub struct TaskSpec {
    /// Name of the task, also used for its thread and timing log.
    pub name: String,

    /// Units: milliseconds
    pub period_ms: f64,

    pub body: TaskBody,
}

/// Runtime settings shared by all tasks.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Tasks stop once the simulation clock reaches this.
    ///
    /// Units: seconds
    pub horizon_s: f64,

    /// Lock process memory before starting the tasks.
    pub lock_memory: bool,

    /// Request FIFO scheduling for each task.
    pub realtime: bool,

    /// Priority of the highest rate task.
    pub rt_max_priority: i32,

    /// Directory for the per-task timing logs, `None` to not write them.
    pub timing_dir: Option<PathBuf>,
}

/// How a task ended up being scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimingMode {
    /// FIFO priority with absolute-time sleeps on the monotonic clock.
    RealTime,
    /// Normal scheduling with relative sleeps to the same deadlines.
    BestEffort,
}

/// Record of one task's run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub period_ms: f64,
    pub priority: i32,
    pub timing: TimingMode,

    /// Number of periods executed.
    pub cycles: u64,

    /// Number of wakeups which found the next deadline already passed.
    pub overruns: u64,

    pub jitter: Option<JitterSummary>,
}

/// Result of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tasks: Vec<TaskReport>,

    /// Names of tasks which panicked.
    pub panicked: Vec<String>,
}

/// Raises the stop flag if the owning thread unwinds.
struct StopOnPanic(Arc<AtomicBool>);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("No tasks to run")]
    NoTasks,

    #[error("Task {0} has an invalid period of {1} ms")]
    InvalidPeriod(String, f64),

    #[error("Could not spawn the thread for task {0}: {1}")]
    SpawnFailed(String, std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Assign rate-monotonic priorities.
///
/// `periods_ms` is in pipeline order. The returned priorities are in the same order, all distinct,
/// counting down from `max_priority`.
pub fn rate_monotonic_priorities(periods_ms: &[f64], max_priority: i32) -> Vec<i32> {
    let mut order: Vec<usize> = (0..periods_ms.len()).collect();

    // Stable sort keeps pipeline order between equal periods
    order.sort_by(|&a, &b| {
        periods_ms[a]
            .partial_cmp(&periods_ms[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut priorities = vec![0; periods_ms.len()];
    for (rank, &idx) in order.iter().enumerate() {
        priorities[idx] = max_priority - rank as i32;
    }

    priorities
}

/// Run the task set to completion.
///
/// Returns once every task has stopped and been joined.
pub fn run(
    ds: Arc<DataStore>,
    tasks: Vec<TaskSpec>,
    config: &RuntimeConfig,
) -> Result<RunReport, TaskError> {
    if tasks.is_empty() {
        return Err(TaskError::NoTasks);
    }

    for t in tasks.iter() {
        if !(t.period_ms > 0.0) {
            return Err(TaskError::InvalidPeriod(t.name.clone(), t.period_ms));
        }
    }

    if config.lock_memory {
        match util::rt::lock_memory() {
            Ok(_) => info!("Process memory locked"),
            Err(e) => warn!("{}, page faults may add jitter", e),
        }
    }

    let periods: Vec<f64> = tasks.iter().map(|t| t.period_ms).collect();
    let priorities = rate_monotonic_priorities(&periods, config.rt_max_priority);

    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(tasks.len());

    for (task, priority) in tasks.into_iter().zip(priorities.into_iter()) {
        let name = task.name.clone();
        let ds = ds.clone();
        let stop_flag = stop.clone();
        let config = config.clone();

        let spawn_result = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = StopOnPanic(stop_flag.clone());
                runner::task_loop(task, priority, &ds, &stop_flag, &config)
            });

        match spawn_result {
            Ok(jh) => handles.push((name, jh)),
            Err(e) => {
                error!("Could not start task {}, stopping the tasks already started", name);
                stop.store(true, Ordering::SeqCst);
                for (_, jh) in handles {
                    jh.join().ok();
                }
                return Err(TaskError::SpawnFailed(name, e));
            }
        }
    }

    info!("{} tasks started", handles.len());

    let mut report = RunReport {
        tasks: Vec::with_capacity(handles.len()),
        panicked: Vec::new(),
    };

    for (name, jh) in handles {
        match jh.join() {
            Ok(r) => report.tasks.push(r),
            Err(_) => {
                error!("Task {} panicked", name);
                report.panicked.push(name);
            }
        }
    }

    info!("All tasks joined");

    Ok(report)
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_store::Gains;
    use nalgebra::Vector3;
    use std::sync::atomic::AtomicU64;

    fn test_config(horizon_s: f64) -> RuntimeConfig {
        RuntimeConfig {
            horizon_s,
            lock_memory: false,
            realtime: false,
            rt_max_priority: 80,
            timing_dir: None,
        }
    }

    fn test_store() -> Arc<DataStore> {
        Arc::new(DataStore::new(Vector3::zeros(), Gains::new(1.0, 1.0), 0.3))
    }

    #[test]
    fn test_rate_monotonic() {
        // Pipeline order: ref_gen, ref_model_x, ref_model_y, controller, linearizer, plant, logger
        let periods = [120.0, 50.0, 50.0, 30.0, 20.0, 10.0, 100.0];
        let prio = rate_monotonic_priorities(&periods, 80);

        assert_eq!(prio[5], 80); // plant, fastest
        assert_eq!(prio[4], 79); // linearizer
        assert_eq!(prio[3], 78); // controller
        assert_eq!(prio[1], 77); // ref_model_x, upstream of y
        assert_eq!(prio[2], 76); // ref_model_y
        assert_eq!(prio[6], 75); // logger
        assert_eq!(prio[0], 74); // ref_gen, slowest
    }

    #[test]
    fn test_rate_monotonic_ties_keep_pipeline_order() {
        let prio = rate_monotonic_priorities(&[10.0, 10.0, 10.0], 50);
        assert_eq!(prio, vec![50, 49, 48]);
    }

    #[test]
    fn test_all_tasks_stop_at_horizon() {
        let ds = test_store();
        let reader_cycles = Arc::new(AtomicU64::new(0));

        let clock_ds = ds.clone();
        let clock = TaskSpec {
            name: String::from("clock"),
            period_ms: 2.0,
            body: Box::new(move || {
                let t = clock_ds.sim_time_s.read();
                clock_ds.sim_time_s.write(t + 0.002);
            }),
        };

        let counter = reader_cycles.clone();
        let reader = TaskSpec {
            name: String::from("reader"),
            period_ms: 5.0,
            body: Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        };

        let report = run(ds.clone(), vec![clock, reader], &test_config(0.05)).unwrap();

        assert!(report.panicked.is_empty());
        assert_eq!(report.tasks.len(), 2);
        assert!(ds.sim_time_s.read() >= 0.05);

        let clock_rpt = &report.tasks[0];
        assert_eq!(clock_rpt.name, "clock");
        assert_eq!(clock_rpt.timing, TimingMode::BestEffort);
        assert_eq!(clock_rpt.priority, 80);
        // 0.002 s per cycle, floating point accumulation may add one cycle
        assert!(clock_rpt.cycles >= 25 && clock_rpt.cycles <= 26);
        assert_eq!(clock_rpt.jitter.unwrap().samples, clock_rpt.cycles - 1);

        assert_eq!(report.tasks[1].priority, 79);
        assert_eq!(report.tasks[1].cycles, reader_cycles.load(Ordering::Relaxed));
        assert!(report.tasks[1].cycles > 0);
    }

    #[test]
    fn test_panic_stops_siblings() {
        let ds = test_store();

        let panicking = TaskSpec {
            name: String::from("panicking"),
            period_ms: 1.0,
            body: Box::new(|| panic!("task failure")),
        };

        // Never advances the clock, only the stop flag can end it
        let idle = TaskSpec {
            name: String::from("idle"),
            period_ms: 1.0,
            body: Box::new(|| ()),
        };

        let report = run(ds, vec![panicking, idle], &test_config(1.0)).unwrap();

        assert_eq!(report.panicked, vec![String::from("panicking")]);
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].name, "idle");
    }

    #[test]
    fn test_invalid_task_sets() {
        assert!(matches!(
            run(test_store(), Vec::new(), &test_config(1.0)),
            Err(TaskError::NoTasks)
        ));

        let bad = TaskSpec {
            name: String::from("bad"),
            period_ms: 0.0,
            body: Box::new(|| ()),
        };
        assert!(matches!(
            run(test_store(), vec![bad], &test_config(1.0)),
            Err(TaskError::InvalidPeriod(_, _))
        ));
    }

    #[test]
    fn test_timing_logs_written() {
        let dir = std::env::temp_dir().join(format!("task_timing_test_{}", std::process::id()));
        let mut config = test_config(0.02);
        config.timing_dir = Some(dir.clone());

        let ds = test_store();
        let clock_ds = ds.clone();
        let clock = TaskSpec {
            name: String::from("plant"),
            period_ms: 2.0,
            body: Box::new(move || {
                let t = clock_ds.sim_time_s.read();
                clock_ds.sim_time_s.write(t + 0.002);
            }),
        };

        let report = run(ds, vec![clock], &config).unwrap();

        let contents = std::fs::read_to_string(dir.join("plant_timing.txt")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("T(k)"));

        let intervals: Vec<f64> = lines.map(|l| l.parse().unwrap()).collect();
        assert_eq!(intervals.len() as u64, report.tasks[0].cycles - 1);
        assert!(intervals.iter().all(|&t| t > 0.0));

        std::fs::remove_dir_all(dir).ok();
    }
}
