//! Inter-wakeup interval statistics
//!
//! For every task the runtime records `T(k)`, the measured time between consecutive wakeups.
//! The jitter is `J(k) = T(k) - T_nominal`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Running statistics of the inter-wakeup interval, updated in constant time and without
/// allocation.
#[derive(Debug, Clone)]
pub struct JitterStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

/// Summary of a series of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// Sample variance (n - 1 denominator).
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Timing summary of one task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JitterSummary {
    pub samples: u64,
    pub nominal_ms: f64,

    /// Statistics of `T(k)`.
    ///
    /// Units: milliseconds
    pub interval_ms: SeriesStats,

    /// Statistics of `J(k)`.
    ///
    /// Units: milliseconds
    pub jitter_ms: SeriesStats,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for JitterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterStats {
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: std::f64::INFINITY,
            max: std::f64::NEG_INFINITY,
        }
    }

    /// Add one measured interval.
    pub fn record(&mut self, interval_ms: f64) {
        self.count += 1;

        let delta = interval_ms - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (interval_ms - self.mean);

        if interval_ms < self.min {
            self.min = interval_ms;
        }
        if interval_ms > self.max {
            self.max = interval_ms;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summarise the recorded intervals against the nominal period, or `None` if nothing has
    /// been recorded.
    pub fn summary(&self, nominal_ms: f64) -> Option<JitterSummary> {
        if self.count == 0 {
            return None;
        }

        let variance = if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        };

        let interval_ms = SeriesStats {
            mean: self.mean,
            variance,
            std_dev: variance.sqrt(),
            min: self.min,
            max: self.max,
        };

        // Shifting by a constant leaves the spread unchanged
        let jitter_ms = SeriesStats {
            mean: self.mean - nominal_ms,
            min: self.min - nominal_ms,
            max: self.max - nominal_ms,
            ..interval_ms
        };

        Some(JitterSummary {
            samples: self.count,
            nominal_ms,
            interval_ms,
            jitter_ms,
        })
    }
}

/// Log a timing table for a task.
pub fn log_summary(task_name: &str, summary: &JitterSummary) {
    info!("--- {} ({:.1} ms, {} samples) ---", task_name, summary.nominal_ms, summary.samples);
    info!(
        "    {:<6} | {:>10} | {:>10} | {:>10} | {:>21}",
        "Metric", "Mean", "Variance", "Std. Dev.", "Min / Max"
    );
    for &(label, s) in [("T(k)", &summary.interval_ms), ("J(k)", &summary.jitter_ms)].iter() {
        info!(
            "    {:<6} | {:>10.4} | {:>10.4} | {:>10.4} | {:>10.4} / {:>8.4}",
            label, s.mean, s.variance, s.std_dev, s.min, s.max
        );
    }
}
