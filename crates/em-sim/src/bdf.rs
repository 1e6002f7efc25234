//! Adaptive implicit multistep backend.
//!
//! Variable-step BDF: order 1 (implicit Euler) until three points of history
//! exist, order 2 afterwards. Each step solves the implicit corrector with a
//! simplified Newton iteration on `I - gamma*h*J` (dense 4x4 LU). The local
//! error is estimated from the predictor/corrector difference and drives the
//! step size. Steps are clamped so that every output time is hit exactly.

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;
use crate::recorder::TrajectoryRecorder;
use crate::run::RunDescriptor;
use crate::solver::{Solution, SolveStats, StepFailure};
use crate::state::State;
use nalgebra::{Matrix4, Vector4};
use std::collections::VecDeque;

const BACKEND: &str = "bdf";

/// Newton iterations per attempted step before cutting the step.
const MAX_NEWTON_ITERS: usize = 4;
/// Newton convergence threshold on the weighted RMS norm of the update.
const NEWTON_TOL: f64 = 1e-3;
/// Step reduction after a failed Newton iteration.
const NEWTON_CUTBACK: f64 = 0.25;
/// Safety factor in the step-size update.
const SAFETY: f64 = 0.9;
/// Growth is capped at 2x so the BDF2 step ratio stays zero-stable.
const MAX_GROWTH: f64 = 2.0;
const MIN_GROWTH: f64 = 0.2;
const MIN_REJECT_FACTOR: f64 = 0.1;
const MAX_REJECT_FACTOR: f64 = 0.9;

/// Settings of the BDF backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BdfOptions {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// First internal step
    pub initial_step: f64,
    /// Upper bound on any internal step
    pub max_step: f64,
    /// Accepted internal steps allowed per run
    pub max_num_steps: usize,
}

impl Default for BdfOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-7,
            initial_step: 1e-10,
            max_step: 1.0,
            max_num_steps: 500_000_000,
        }
    }
}

impl BdfOptions {
    pub fn validate(&self) -> SimResult<()> {
        let init_err = |resource: &'static str, message: &str| SimError::BackendInit {
            backend: BACKEND,
            resource,
            message: message.to_string(),
        };
        if !(self.rtol.is_finite() && self.rtol >= 0.0) {
            return Err(init_err("tolerances", "rtol must be finite and non-negative"));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(init_err("tolerances", "atol must be finite and positive"));
        }
        if !(self.max_step.is_finite() && self.max_step > 0.0) {
            return Err(init_err("max_step", "max_step must be finite and positive"));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(init_err(
                "initial_step",
                "initial_step must be finite and positive",
            ));
        }
        if self.initial_step > self.max_step {
            return Err(init_err("initial_step", "initial_step exceeds max_step"));
        }
        if self.max_num_steps == 0 {
            return Err(init_err("max_num_steps", "max_num_steps must be positive"));
        }
        Ok(())
    }
}

/// BDF integrator bound to validated options.
#[derive(Clone, Copy, Debug)]
pub struct Bdf {
    opts: BdfOptions,
}

enum Attempt {
    Accepted { y: Vector4<f64>, err: f64 },
    ErrorTooLarge { err: f64 },
    NewtonFailed,
}

/// Mutable integration state of one run. Dropped on every exit path.
struct Workspace {
    t: f64,
    y: Vector4<f64>,
    h: f64,
    /// Last accepted points, oldest first; the back is `(t, y)`.
    history: VecDeque<(f64, Vector4<f64>)>,
}

fn to_vector(s: &State) -> Vector4<f64> {
    Vector4::new(s.y, s.dy, s.q, s.dq)
}

fn to_state(v: &Vector4<f64>) -> State {
    State::new(v[0], v[1], v[2], v[3])
}

fn jacobian_matrix<M: TransientModel>(model: &M, t: f64, y: &Vector4<f64>) -> Matrix4<f64> {
    let jac = model.jacobian(t, &to_state(y));
    Matrix4::from_fn(|i, j| jac[i][j])
}

fn wrms(v: &Vector4<f64>, weights: &Vector4<f64>) -> f64 {
    let sum: f64 = v.iter().zip(weights.iter()).map(|(x, w)| (x / w).powi(2)).sum();
    (sum / 4.0).sqrt()
}

impl Bdf {
    pub fn new(opts: BdfOptions) -> SimResult<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn options(&self) -> &BdfOptions {
        &self.opts
    }

    pub fn integrate<M: TransientModel>(
        &self,
        model: &M,
        run: &RunDescriptor,
    ) -> SimResult<Solution> {
        let y0 = to_vector(run.initial());
        let jac0 = jacobian_matrix(model, run.t_start(), &y0);
        if jac0.iter().any(|v| !v.is_finite()) {
            return Err(SimError::BackendInit {
                backend: BACKEND,
                resource: "jacobian",
                message: "Jacobian at the initial state is not finite".to_string(),
            });
        }

        let mut ws = Workspace {
            t: run.t_start(),
            y: y0,
            h: self.opts.initial_step,
            history: VecDeque::with_capacity(3),
        };
        ws.history.push_back((ws.t, ws.y));

        let mut recorder = TrajectoryRecorder::initialize(run);
        let mut stats = SolveStats::default();
        let mut failure = None;

        for k in 1..=run.steps() {
            let t_out = run.time_at(k);
            if let Err(reason) = self.advance_to(model, &mut ws, t_out, &mut stats) {
                failure = Some(StepFailure { t: ws.t, reason });
                break;
            }
            if let Err(e) = recorder.record(t_out, to_state(&ws.y)) {
                failure = Some(StepFailure {
                    t: ws.t,
                    reason: e.to_string(),
                });
                break;
            }
        }

        Ok(Solution {
            trajectory: recorder.finalize()?,
            stats,
            failure,
        })
    }

    /// Take internal steps until `ws.t == t_out`.
    fn advance_to<M: TransientModel>(
        &self,
        model: &M,
        ws: &mut Workspace,
        t_out: f64,
        stats: &mut SolveStats,
    ) -> Result<(), String> {
        let tiny = 1e-12 * t_out.abs().max(1.0);

        while ws.t < t_out - tiny {
            if stats.steps >= self.opts.max_num_steps {
                return Err(format!(
                    "max_num_steps ({}) reached before t = {}",
                    self.opts.max_num_steps, t_out
                ));
            }

            let remaining = t_out - ws.t;
            let mut h = ws.h.min(self.opts.max_step);
            let mut hits_stop = h >= remaining - tiny;
            if hits_stop {
                h = remaining;
            }

            loop {
                let h_min = 1e-14 * ws.t.abs().max(1.0);
                if h < h_min {
                    return Err(format!("step size underflow (h = {h:e}) at t = {}", ws.t));
                }

                let order = if ws.history.len() < 3 { 1 } else { 2 };
                match self.attempt(model, ws, h, order, stats) {
                    Attempt::Accepted { y, err } => {
                        ws.t = if hits_stop { t_out } else { ws.t + h };
                        ws.y = y;
                        if ws.history.len() == 3 {
                            ws.history.pop_front();
                        }
                        ws.history.push_back((ws.t, ws.y));
                        stats.steps += 1;

                        let factor = SAFETY * err.max(1e-10).powf(-1.0 / (order as f64 + 1.0));
                        ws.h = h * factor.clamp(MIN_GROWTH, MAX_GROWTH);
                        break;
                    }
                    Attempt::ErrorTooLarge { err } => {
                        stats.rejected_steps += 1;
                        let factor = SAFETY * err.powf(-1.0 / (order as f64 + 1.0));
                        h *= factor.clamp(MIN_REJECT_FACTOR, MAX_REJECT_FACTOR);
                        hits_stop = false;
                    }
                    Attempt::NewtonFailed => {
                        stats.rejected_steps += 1;
                        h *= NEWTON_CUTBACK;
                        hits_stop = false;
                    }
                }
            }
        }
        Ok(())
    }

    /// Try one step of size `h` from the back of the history.
    fn attempt<M: TransientModel>(
        &self,
        model: &M,
        ws: &Workspace,
        h: f64,
        order: usize,
        stats: &mut SolveStats,
    ) -> Attempt {
        let t_new = ws.t + h;
        let y = ws.y;

        // Corrector: z - a - gamma*h*f(z) = 0
        let (a, gamma, y_pred, err_coeff) = if order == 1 {
            let f_n = to_vector(&model.rhs(ws.t, &to_state(&y)));
            stats.rhs_evals += 1;
            // Milne: implicit Euler vs explicit Euler predictor
            (y, 1.0, y + f_n * h, 0.5)
        } else {
            let (t2, y2) = ws.history[0];
            let (t1, y1) = ws.history[1];
            let w = h / (ws.t - t1);
            let denom = 1.0 + 2.0 * w;
            let a = (y * (1.0 + w).powi(2) - y1 * (w * w)) / denom;
            let gamma = (1.0 + w) / denom;

            // Quadratic extrapolation through the three history points
            let t0 = ws.t;
            let l2 = (t_new - t1) * (t_new - t0) / ((t2 - t1) * (t2 - t0));
            let l1 = (t_new - t2) * (t_new - t0) / ((t1 - t2) * (t1 - t0));
            let l0 = (t_new - t2) * (t_new - t1) / ((t0 - t2) * (t0 - t1));
            let y_pred = y2 * l2 + y1 * l1 + y * l0;

            (a, gamma, y_pred, h / (t_new - t2))
        };

        let weights = y.map(|v| self.opts.atol + self.opts.rtol * v.abs());
        let iteration = Matrix4::identity() - jacobian_matrix(model, t_new, &y_pred) * (gamma * h);
        let lu = iteration.lu();

        let mut z = y_pred;
        let mut converged = false;
        for _ in 0..MAX_NEWTON_ITERS {
            let fz = to_vector(&model.rhs(t_new, &to_state(&z)));
            stats.rhs_evals += 1;
            let g = z - a - fz * (gamma * h);
            let Some(dz) = lu.solve(&(-g)) else {
                return Attempt::NewtonFailed;
            };
            z += dz;
            if z.iter().any(|v| !v.is_finite()) {
                return Attempt::NewtonFailed;
            }
            if wrms(&dz, &weights) < NEWTON_TOL {
                converged = true;
                break;
            }
        }
        if !converged {
            return Attempt::NewtonFailed;
        }

        let err = wrms(&((z - y_pred) * err_coeff), &weights);
        if err <= 1.0 {
            Attempt::Accepted { y: z, err }
        } else {
            Attempt::ErrorTooLarge { err }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::STATE_LEN;

    /// x' = -x in every component.
    struct Decay;

    impl TransientModel for Decay {
        fn rhs(&self, _t: f64, x: &State) -> State {
            *x * -1.0
        }

        fn jacobian(&self, _t: f64, _x: &State) -> [[f64; STATE_LEN]; STATE_LEN] {
            let mut j = [[0.0; STATE_LEN]; STATE_LEN];
            for (i, row) in j.iter_mut().enumerate() {
                row[i] = -1.0;
            }
            j
        }
    }

    #[test]
    fn default_options_validate() {
        assert!(BdfOptions::default().validate().is_ok());
    }

    #[test]
    fn invalid_options_name_the_failing_resource() {
        let bad = BdfOptions {
            atol: 0.0,
            ..BdfOptions::default()
        };
        match Bdf::new(bad) {
            Err(SimError::BackendInit {
                backend, resource, ..
            }) => {
                assert_eq!(backend, "bdf");
                assert_eq!(resource, "tolerances");
            }
            other => panic!("expected BackendInit, got {other:?}"),
        }

        let bad = BdfOptions {
            initial_step: 2.0,
            max_step: 1.0,
            ..BdfOptions::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SimError::BackendInit {
                resource: "initial_step",
                ..
            })
        ));
    }

    #[test]
    fn decay_matches_exponential() {
        let run = RunDescriptor::new(State::new(1.0, 2.0, -1.0, 0.5), 0.0, 1.0, 0.25).unwrap();
        let sol = Bdf::new(BdfOptions::default())
            .unwrap()
            .integrate(&Decay, &run)
            .unwrap();
        assert!(sol.is_complete());
        assert_eq!(sol.trajectory.len(), 5);
        let last = sol.trajectory.last().unwrap();
        assert_eq!(last.time, 1.0);
        let e = (-1.0_f64).exp();
        assert!((last.state.y - e).abs() < 1e-4);
        assert!((last.state.dy - 2.0 * e).abs() < 1e-4);
        assert!((last.state.q + e).abs() < 1e-4);
        assert!(sol.stats.steps > 4);
    }

    #[test]
    fn exhausted_step_budget_keeps_partial_trajectory() {
        let opts = BdfOptions {
            max_num_steps: 30,
            ..BdfOptions::default()
        };
        let run = RunDescriptor::new(State::new(1.0, 0.0, 0.0, 0.0), 0.0, 10.0, 1.0).unwrap();
        let sol = Bdf::new(opts).unwrap().integrate(&Decay, &run).unwrap();
        let failure = sol.failure.expect("step budget should run out");
        assert!(failure.reason.contains("max_num_steps"));
        assert!(sol.trajectory.len() < run.expected_len());
        assert_eq!(sol.trajectory.first().unwrap().state.y, 1.0);
    }
}
