//! TransientModel trait: the single right-hand side shared by every backend.

use crate::state::{PhysicalConstants, STATE_LEN, State, derivatives, jacobian};

/// Trait for the dynamic system handed to a solver backend.
///
/// Every backend (fixed-step RK4, BDF, the `ode_solvers` adapter) evaluates
/// the system only through this trait, so all of them see the same equations
/// and the same constants.
pub trait TransientModel {
    /// Compute state derivative dxdt = f(t, x).
    fn rhs(&self, t: f64, x: &State) -> State;

    /// Jacobian df/dx, used by implicit backends.
    fn jacobian(&self, t: f64, x: &State) -> [[f64; STATE_LEN]; STATE_LEN];
}

/// The coupled displacement/charge oscillator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ElectromechanicalSystem {
    pub constants: PhysicalConstants,
}

impl ElectromechanicalSystem {
    pub fn new(constants: PhysicalConstants) -> Self {
        Self { constants }
    }
}

impl TransientModel for ElectromechanicalSystem {
    // Autonomous: t is accepted for interface symmetry only.
    #[inline]
    fn rhs(&self, _t: f64, x: &State) -> State {
        derivatives(x, &self.constants)
    }

    fn jacobian(&self, _t: f64, x: &State) -> [[f64; STATE_LEN]; STATE_LEN] {
        jacobian(x, &self.constants)
    }
}

impl<M: TransientModel + ?Sized> TransientModel for &M {
    fn rhs(&self, t: f64, x: &State) -> State {
        (**self).rhs(t, x)
    }

    fn jacobian(&self, t: f64, x: &State) -> [[f64; STATE_LEN]; STATE_LEN] {
        (**self).jacobian(t, x)
    }
}
