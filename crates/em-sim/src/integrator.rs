//! Fixed-step time integrators.

use crate::model::TransientModel;
use crate::state::State;

/// Trait for one-step time integrators.
pub trait Integrator {
    /// Advance state by one time step using the transient model.
    fn step<M: TransientModel>(&self, model: &M, t: f64, x: &State, dt: f64) -> State;

    /// Right-hand side evaluations per step.
    fn rhs_evals_per_step(&self) -> usize;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RK4;

impl Integrator for RK4 {
    #[inline]
    fn step<M: TransientModel>(&self, model: &M, t: f64, x: &State, dt: f64) -> State {
        let k1 = model.rhs(t, x);

        let x2 = *x + k1 * (0.5 * dt);
        let k2 = model.rhs(t + 0.5 * dt, &x2);

        let x3 = *x + k2 * (0.5 * dt);
        let k3 = model.rhs(t + 0.5 * dt, &x3);

        let x4 = *x + k3 * dt;
        let k4 = model.rhs(t + dt, &x4);

        // Combine: x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = (k1 + k2 * 2.0) + (k3 * 2.0 + k4);

        *x + k_sum * (dt / 6.0)
    }

    fn rhs_evals_per_step(&self) -> usize {
        4
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
    fn rk4_matches_taylor_polynomial_for_linear_decay() {
        // For x' = -x one RK4 step multiplies by 1 - h + h^2/2 - h^3/6 + h^4/24.
        let h: f64 = 0.1;
        let factor = 1.0 - h + h * h / 2.0 - h.powi(3) / 6.0 + h.powi(4) / 24.0;
        let x = State::new(1.0, 2.0, -1.0, 0.5);
        let next = RK4.step(&Decay, 0.0, &x, h);
        for (a, b) in next.to_array().iter().zip(x.to_array()) {
            assert!((a - b * factor).abs() < 1e-14);
        }
    }

    #[test]
    fn rk4_fourth_order_convergence() {
        let x0 = State::new(1.0, 0.0, 0.0, 0.0);
        let exact = (-1.0_f64).exp();
        let err = |n: usize| {
            let h = 1.0 / n as f64;
            let mut x = x0;
            for k in 0..n {
                x = RK4.step(&Decay, k as f64 * h, &x, h);
            }
            (x.y - exact).abs()
        };
        let ratio = err(10) / err(20);
        // Halving h should reduce the error by ~16x.
        assert!(ratio > 14.0 && ratio < 18.0, "ratio = {ratio}");
    }
}
