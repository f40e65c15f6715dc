//! General time utility functions


/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Number of nanoseconds in a millisecond
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a period in milliseconds into whole nanoseconds.
pub fn millis_to_nanos(period_ms: f64) -> i64 {
    (period_ms * NANOS_PER_MILLI as f64).round() as i64
}

/// Add a number of nanoseconds to a timespec, keeping the nanosecond field normalised to
/// `[0, 1e9)`.
pub fn timespec_add_ns(ts: libc::timespec, ns: i64) -> libc::timespec {
    let mut secs = ts.tv_sec as i64 + ns / NANOS_PER_SECOND;
    let mut nanos = ts.tv_nsec as i64 + ns % NANOS_PER_SECOND;

    if nanos >= NANOS_PER_SECOND {
        secs += 1;
        nanos -= NANOS_PER_SECOND;
    }
    if nanos < 0 {
        secs -= 1;
        nanos += NANOS_PER_SECOND;
    }

    libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: nanos as libc::c_long,
    }
}

/// Compute `a - b` in nanoseconds.
pub fn timespec_diff_ns(a: &libc::timespec, b: &libc::timespec) -> i64 {
    (a.tv_sec as i64 - b.tv_sec as i64) * NANOS_PER_SECOND
        + (a.tv_nsec as i64 - b.tv_nsec as i64)
}

/// Compute `a - b` in milliseconds.
pub fn timespec_diff_ms(a: &libc::timespec, b: &libc::timespec) -> f64 {
    timespec_diff_ns(a, b) as f64 / NANOS_PER_MILLI as f64
}
