//! Solver strategy selection and the fixed-step integration loop.

use crate::bdf::{Bdf, BdfOptions};
use crate::error::SimResult;
use crate::integrator::{Integrator, RK4};
use crate::model::TransientModel;
use crate::odeint::OdeSolversRk4;
use crate::recorder::{Trajectory, TrajectoryRecorder};
use crate::run::RunDescriptor;

/// Backend used to integrate a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SolverKind {
    /// Classical fixed-step RK4 (default, bit-reproducible).
    #[default]
    Rk4,
    /// Adaptive variable-step BDF with Newton iteration.
    Bdf(BdfOptions),
    /// Fixed-step RK4 from the `ode_solvers` crate.
    OdeSolversRk4,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Rk4 => "rk4",
            SolverKind::Bdf(_) => "bdf",
            SolverKind::OdeSolversRk4 => "ode-solvers-rk4",
        }
    }

    /// Check backend settings without integrating anything.
    pub fn validate(&self) -> SimResult<()> {
        match self {
            SolverKind::Rk4 | SolverKind::OdeSolversRk4 => Ok(()),
            SolverKind::Bdf(opts) => opts.validate(),
        }
    }

    /// Integrate one run on the shared output grid of `run`.
    pub fn integrate<M: TransientModel>(
        &self,
        model: &M,
        run: &RunDescriptor,
    ) -> SimResult<Solution> {
        tracing::debug!(
            solver = self.name(),
            t_start = run.t_start(),
            t_end = run.t_end(),
            dt = run.dt(),
            "integrating run"
        );
        let solution = match self {
            SolverKind::Rk4 => run_fixed_step(model, &RK4, run)?,
            SolverKind::Bdf(opts) => Bdf::new(*opts)?.integrate(model, run)?,
            SolverKind::OdeSolversRk4 => OdeSolversRk4.integrate(model, run)?,
        };
        if let Some(failure) = &solution.failure {
            tracing::warn!(
                solver = self.name(),
                t = failure.t,
                reason = %failure.reason,
                kept = solution.trajectory.len(),
                "integration halted early"
            );
        }
        Ok(solution)
    }
}

/// Counters reported by a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Accepted internal steps
    pub steps: usize,
    /// Rejected internal steps (adaptive backends only)
    pub rejected_steps: usize,
    /// Right-hand side evaluations
    pub rhs_evals: usize,
}

/// Interior failure of an integration that had already started.
#[derive(Clone, Debug, PartialEq)]
pub struct StepFailure {
    /// Time of the last successful state
    pub t: f64,
    pub reason: String,
}

/// Outcome of one integration.
///
/// On an interior failure the trajectory holds every snapshot up to the
/// last successful one and `failure` says where and why it stopped.
#[derive(Clone, Debug)]
pub struct Solution {
    pub trajectory: Trajectory,
    pub stats: SolveStats,
    pub failure: Option<StepFailure>,
}

impl Solution {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Fixed-step loop: step `k` advances from `t_k` to `t_{k+1}` and records
/// the new state at `t_{k+1}`, for `k` in `0..run.steps()`.
pub fn run_fixed_step<M: TransientModel, I: Integrator>(
    model: &M,
    integrator: &I,
    run: &RunDescriptor,
) -> SimResult<Solution> {
    let mut recorder = TrajectoryRecorder::initialize(run);
    let mut x = *run.initial();
    let mut stats = SolveStats::default();
    let mut failure = None;

    for k in 0..run.steps() {
        let t = run.time_at(k);
        let next = integrator.step(model, t, &x, run.dt());
        stats.rhs_evals += integrator.rhs_evals_per_step();

        if let Err(e) = recorder.record(run.time_at(k + 1), next) {
            failure = Some(StepFailure {
                t,
                reason: e.to_string(),
            });
            break;
        }
        x = next;
        stats.steps += 1;
    }

    Ok(Solution {
        trajectory: recorder.finalize()?,
        stats,
        failure,
    })
}
