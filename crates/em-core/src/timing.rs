//! Lightweight performance timing utilities.
//!
//! Measures where a batch spends its wall time. Disabled by default; enable
//! it programmatically or by setting the `EM_TIMING` environment variable.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("EM_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and add the elapsed time to `acc` if enabled.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(elapsed) = self.stop() {
            acc.record(elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
///
/// Safe to share between parallel batch lanes.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    /// Create a new accumulating timer.
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    /// Reset the timer.
    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Per-phase batch timers.
pub mod batch_timing {
    use super::AccumulatingTimer;

    /// Time spent inside solver backends, one sample per run
    pub static INTEGRATE: AccumulatingTimer = AccumulatingTimer::new();
    /// Time spent converting trajectories into columns
    pub static COLUMNS: AccumulatingTimer = AccumulatingTimer::new();
    /// Time spent in storage writes, one sample per group
    pub static WRITE: AccumulatingTimer = AccumulatingTimer::new();

    /// Reset all batch timers.
    pub fn reset_all() {
        INTEGRATE.reset();
        COLUMNS.reset();
        WRITE.reset();
    }

    /// Print per-phase breakdown.
    pub fn print_summary() {
        use super::is_enabled;
        if !is_enabled() {
            return;
        }

        println!("\n=== Batch Phase Breakdown ===");
        for (label, timer) in [
            ("integrate", &INTEGRATE),
            ("columns", &COLUMNS),
            ("write", &WRITE),
        ] {
            let count = timer.count();
            if count > 0 {
                println!(
                    "{:<10} {} calls, {:.3}s total, {:.4}ms avg",
                    label,
                    count,
                    timer.total_seconds(),
                    timer.average_seconds() * 1000.0
                );
            }
        }
        println!("=============================\n");
    }
}

/// Performance statistics collector.
#[derive(Default, Debug, Clone)]
pub struct PerfStats {
    pub setup_time_s: f64,
    pub batch_time_s: f64,
    pub total_time_s: f64,
    pub runs: usize,
    pub steps: usize,
    pub rhs_evals: usize,
}

impl PerfStats {
    /// Print a formatted summary of the statistics.
    pub fn print_summary(&self) {
        if !is_enabled() {
            return;
        }

        println!("\n=== Performance Summary ===");

        if self.setup_time_s > 0.0 {
            println!("Setup time:          {:.3}s", self.setup_time_s);
        }

        if self.batch_time_s > 0.0 {
            println!("Batch time:          {:.3}s", self.batch_time_s);
            if self.runs > 0 {
                println!("  Runs:              {}", self.runs);
                println!(
                    "  Avg run time:      {:.4}s",
                    self.batch_time_s / self.runs as f64
                );
            }
            if self.steps > 0 {
                println!("  Steps:             {}", self.steps);
                println!("  RHS evaluations:   {}", self.rhs_evals);
            }
        }

        println!("Total time:          {:.3}s", self.total_time_s);
        println!("==========================\n");

        batch_timing::print_summary();
    }
}
