//! Run descriptor: the immutable input of one integration.

use crate::error::{SimError, SimResult};
use crate::state::State;
use em_core::{grid_time, step_count};

/// Initial state plus horizon `[t_start, t_end]` and fixed step `dt`.
///
/// Validated on construction; fields are read-only afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunDescriptor {
    initial: State,
    t_start: f64,
    t_end: f64,
    dt: f64,
    steps: usize,
}

impl RunDescriptor {
    pub fn new(initial: State, t_start: f64, t_end: f64, dt: f64) -> SimResult<Self> {
        if let Some((what, value)) = initial.first_non_finite() {
            return Err(SimError::NonFinite { what, value });
        }
        let steps = step_count(t_start, t_end, dt)?;
        Ok(Self {
            initial,
            t_start,
            t_end,
            dt,
            steps,
        })
    }

    pub fn initial(&self) -> &State {
        &self.initial
    }

    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of fixed steps: `floor((t_end - t_start) / dt)`.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of snapshots in a complete trajectory.
    pub fn expected_len(&self) -> usize {
        self.steps + 1
    }

    /// Output time of grid point `k`.
    pub fn time_at(&self, k: usize) -> f64 {
        grid_time(self.t_start, self.dt, k)
    }
}
