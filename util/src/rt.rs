//! Real-time platform functions
//!
//! Thin wrappers around the POSIX calls needed to run periodic tasks with low jitter: locking the
//! process memory, moving the calling thread into the FIFO scheduling class, and sleeping until an
//! absolute point on the monotonic clock.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nix::sys::mman::{mlockall, MlockAllFlags};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lowest priority of the FIFO scheduling class.
pub const FIFO_MIN_PRIORITY: i32 = 1;

/// Highest priority of the FIFO scheduling class.
pub const FIFO_MAX_PRIORITY: i32 = 99;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the real-time platform functions.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("Could not lock process memory: {0}")]
    MemLockFailed(nix::Error),

    #[error("Could not set FIFO scheduling at priority {0}: {1}")]
    SchedulerFailed(i32, std::io::Error),

    #[error("Priority {0} is outside the FIFO range")]
    InvalidPriority(i32),

    #[error("Could not read the monotonic clock: {0}")]
    ClockFailed(std::io::Error),

    #[error("Absolute sleep failed: {0}")]
    SleepFailed(std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Lock all current and future pages of the process into RAM, so that no page fault can occur
/// once scheduling has started.
pub fn lock_memory() -> Result<(), RtError> {
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(RtError::MemLockFailed)
}

/// Move the calling thread into the FIFO real-time scheduling class at the given priority.
///
/// Usually requires `CAP_SYS_NICE` or a suitable `RLIMIT_RTPRIO`.
pub fn set_fifo_priority(priority: i32) -> Result<(), RtError> {
    if priority < FIFO_MIN_PRIORITY || priority > FIFO_MAX_PRIORITY {
        return Err(RtError::InvalidPriority(priority));
    }

    let param = libc::sched_param {
        sched_priority: priority,
    };

    // Pid 0 refers to the calling thread
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(RtError::SchedulerFailed(
            priority,
            std::io::Error::last_os_error(),
        ));
    }

    Ok(())
}

/// Read the monotonic clock.
pub fn monotonic_now() -> Result<libc::timespec, RtError> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    let ret = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if ret != 0 {
        return Err(RtError::ClockFailed(std::io::Error::last_os_error()));
    }

    Ok(ts)
}

/// Block the calling thread until the monotonic clock reaches `deadline`.
///
/// Returns immediately if the deadline has already passed. Signal interruptions are retried
/// against the same absolute deadline.
pub fn sleep_until(deadline: &libc::timespec) -> Result<(), RtError> {
    loop {
        let ret = unsafe {
            libc::clock_nanosleep(
                libc::CLOCK_MONOTONIC,
                libc::TIMER_ABSTIME,
                deadline,
                std::ptr::null_mut(),
            )
        };

        match ret {
            0 => return Ok(()),
            libc::EINTR => continue,
            e => return Err(RtError::SleepFailed(std::io::Error::from_raw_os_error(e))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::{timespec_add_ns, timespec_diff_ns};

    #[test]
    fn test_invalid_priority_rejected() {
        assert!(matches!(set_fifo_priority(0), Err(RtError::InvalidPriority(0))));
        assert!(matches!(set_fifo_priority(100), Err(RtError::InvalidPriority(100))));
    }

    #[test]
    fn test_sleep_until_absolute() {
        let start = monotonic_now().unwrap();
        let deadline = timespec_add_ns(start, 5_000_000);

        sleep_until(&deadline).unwrap();

        let end = monotonic_now().unwrap();
        assert!(timespec_diff_ns(&end, &deadline) >= 0);
    }

    #[test]
    fn test_sleep_until_past_deadline_returns() {
        let start = monotonic_now().unwrap();
        let deadline = timespec_add_ns(start, -1_000_000);

        sleep_until(&deadline).unwrap();
    }
}
