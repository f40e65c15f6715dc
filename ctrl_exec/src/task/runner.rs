//! Per-task periodic loop

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use util::{
    archive::Archiver,
    rt,
    time::{millis_to_nanos, timespec_add_ns, timespec_diff_ms, timespec_diff_ns},
};

use super::{RuntimeConfig, TaskReport, TaskSpec, TimingMode};
use crate::data_store::DataStore;
use crate::telemetry::JitterStats;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Header of the per-task timing log.
const TIMING_LOG_HEADER: [&str; 1] = ["T(k)"];

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Body of a task thread.
///
/// Each period: wake, run the body, record the interval since the previous wakeup, advance the
/// deadline by exactly one period and sleep until it.
pub(super) fn task_loop(
    mut task: TaskSpec,
    priority: i32,
    ds: &DataStore,
    stop: &AtomicBool,
    config: &RuntimeConfig,
) -> TaskReport {
    let timing = select_timing(&task.name, priority, config.realtime);

    info!(
        "Task {} started: period {:.1} ms, priority {}, {:?}",
        task.name, task.period_ms, priority, timing
    );

    let mut report = TaskReport {
        name: task.name.clone(),
        period_ms: task.period_ms,
        priority,
        timing,
        cycles: 0,
        overruns: 0,
        jitter: None,
    };

    let mut timing_log = config.timing_dir.as_ref().and_then(|dir| {
        match Archiver::from_path(
            dir,
            format!("{}_timing.txt", task.name),
            b',',
            &TIMING_LOG_HEADER,
        ) {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("Task {} will run without a timing log: {}", task.name, e);
                None
            }
        }
    });

    let period_ns = millis_to_nanos(task.period_ms);
    let mut stats = JitterStats::new();

    let mut deadline = match rt::monotonic_now() {
        Ok(t) => t,
        Err(e) => {
            error!("Task {} cannot start: {}", task.name, e);
            stop.store(true, Ordering::SeqCst);
            return report;
        }
    };
    let mut last_wake: Option<libc::timespec> = None;

    loop {
        if stop.load(Ordering::SeqCst) || ds.sim_time_s.read() >= config.horizon_s {
            break;
        }

        let wake = match rt::monotonic_now() {
            Ok(t) => t,
            Err(e) => {
                error!("Task {} lost the monotonic clock: {}", task.name, e);
                stop.store(true, Ordering::SeqCst);
                break;
            }
        };

        // Compute
        (task.body)();
        report.cycles += 1;

        // Measure
        if let Some(prev) = last_wake {
            let interval_ms = timespec_diff_ms(&wake, &prev);
            stats.record(interval_ms);

            let log_result = match timing_log {
                Some(ref mut log) => log.write_values(&[interval_ms]),
                None => Ok(()),
            };
            if let Err(e) = log_result {
                warn!("Disabling timing log of task {}: {}", task.name, e);
                timing_log = None;
            }
        }
        last_wake = Some(wake);

        // Sleep
        deadline = timespec_add_ns(deadline, period_ns);

        let now = match rt::monotonic_now() {
            Ok(t) => t,
            Err(_) => wake,
        };
        let remaining_ns = timespec_diff_ns(&deadline, &now);

        if remaining_ns <= 0 {
            report.overruns += 1;
            if report.overruns == 1 {
                warn!(
                    "Task {} missed its deadline by {:.3} ms",
                    task.name,
                    -remaining_ns as f64 * 1e-6
                );
            } else {
                debug!("Task {} overrun #{}", task.name, report.overruns);
            }
            continue;
        }

        match timing {
            TimingMode::RealTime => {
                if let Err(e) = rt::sleep_until(&deadline) {
                    warn!("Task {} absolute sleep failed: {}", task.name, e);
                    std::thread::sleep(Duration::from_nanos(remaining_ns as u64));
                }
            }
            TimingMode::BestEffort => std::thread::sleep(Duration::from_nanos(remaining_ns as u64)),
        }
    }

    // Terminate
    if let Some(mut log) = timing_log {
        if let Err(e) = log.flush() {
            warn!("Could not flush the timing log of task {}: {}", task.name, e);
        }
    }

    report.jitter = stats.summary(task.period_ms);

    info!(
        "Task {} stopped after {} cycles ({} overruns)",
        task.name, report.cycles, report.overruns
    );

    report
}

/// Try to move the calling thread into real-time scheduling, falling back to best effort.
fn select_timing(name: &str, priority: i32, realtime: bool) -> TimingMode {
    if !realtime {
        return TimingMode::BestEffort;
    }

    match rt::set_fifo_priority(priority) {
        Ok(_) => TimingMode::RealTime,
        Err(e) => {
            warn!("Task {} falling back to best-effort scheduling: {}", name, e);
            TimingMode::BestEffort
        }
    }
}
