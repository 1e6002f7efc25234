//! Adapter for the fixed-step RK4 of the `ode_solvers` crate.

use crate::error::SimResult;
use crate::model::TransientModel;
use crate::recorder::TrajectoryRecorder;
use crate::run::RunDescriptor;
use crate::solver::{Solution, SolveStats, StepFailure};
use crate::state::State;
use ode_solvers::{Rk4, SVector, System};

type OdeState = SVector<f64, 4>;

/// Bridges a [`TransientModel`] into the crate's `System` trait.
struct ModelSystem<'a, M> {
    model: &'a M,
}

impl<M: TransientModel> System<f64, OdeState> for ModelSystem<'_, M> {
    fn system(&self, x: f64, y: &OdeState, dy: &mut OdeState) {
        let d = self.model.rhs(x, &State::new(y[0], y[1], y[2], y[3]));
        dy[0] = d.y;
        dy[1] = d.dy;
        dy[2] = d.q;
        dy[3] = d.dq;
    }
}

/// Third-party fixed-step backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct OdeSolversRk4;

impl OdeSolversRk4 {
    pub fn integrate<M: TransientModel>(
        &self,
        model: &M,
        run: &RunDescriptor,
    ) -> SimResult<Solution> {
        let mut recorder = TrajectoryRecorder::initialize(run);
        let mut stats = SolveStats::default();
        let mut failure = None;

        if run.steps() > 0 {
            let init = run.initial();
            let y0 = OdeState::new(init.y, init.dy, init.q, init.dq);
            let mut stepper = Rk4::new(
                ModelSystem { model },
                run.t_start(),
                y0,
                run.time_at(run.steps()),
                run.dt(),
            );
            let result = stepper.integrate();

            // The crate emits the initial point first; it is already recorded.
            // Its step count is a ceil, so a trailing extra sample is dropped.
            for (k, y) in stepper.y_out().iter().enumerate().skip(1).take(run.steps()) {
                let state = State::new(y[0], y[1], y[2], y[3]);
                if let Err(e) = recorder.record(run.time_at(k), state) {
                    failure = Some(StepFailure {
                        t: run.time_at(k - 1),
                        reason: e.to_string(),
                    });
                    break;
                }
                stats.steps += 1;
            }

            match result {
                Ok(s) => stats.rhs_evals = s.num_eval as usize,
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(StepFailure {
                            t: run.time_at(stats.steps),
                            reason: format!("ode_solvers: {e:?}"),
                        });
                    }
                }
            }

            if failure.is_none() && stats.steps < run.steps() {
                failure = Some(StepFailure {
                    t: run.time_at(stats.steps),
                    reason: format!(
                        "backend produced {} of {} steps",
                        stats.steps,
                        run.steps()
                    ),
                });
            }
        }

        Ok(Solution {
            trajectory: recorder.finalize()?,
            stats,
            failure,
        })
    }
}
