//! State vector, physical constants and the right-hand side of the
//! electromechanical ODE.

use crate::error::{SimError, SimResult};
use core::ops::{Add, Mul};

/// Number of components in the state vector.
pub const STATE_LEN: usize = 4;

/// State of the coupled system: displacement `y`, its rate `dy`, charge `q`
/// and its rate `dq`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct State {
    pub y: f64,
    pub dy: f64,
    pub q: f64,
    pub dq: f64,
}

impl State {
    pub const fn new(y: f64, dy: f64, q: f64, dq: f64) -> Self {
        Self { y, dy, q, dq }
    }

    /// Components in `(y, dy, q, dq)` order.
    pub fn to_array(self) -> [f64; STATE_LEN] {
        [self.y, self.dy, self.q, self.dq]
    }

    pub fn from_array(a: [f64; STATE_LEN]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    pub fn is_finite(&self) -> bool {
        self.y.is_finite() && self.dy.is_finite() && self.q.is_finite() && self.dq.is_finite()
    }

    /// First non-finite component, if any.
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [("y", self.y), ("dy", self.dy), ("q", self.q), ("dq", self.dq)]
            .into_iter()
            .find(|(_, v)| !v.is_finite())
    }
}

impl TryFrom<&[f64]> for State {
    type Error = SimError;

    fn try_from(values: &[f64]) -> SimResult<Self> {
        let arr: [f64; STATE_LEN] = values.try_into().map_err(|_| SimError::InvalidArg {
            what: "state vector must have exactly 4 components",
        })?;
        Ok(Self::from_array(arr))
    }
}

impl Add for State {
    type Output = State;

    fn add(self, rhs: State) -> State {
        State {
            y: self.y + rhs.y,
            dy: self.dy + rhs.dy,
            q: self.q + rhs.q,
            dq: self.dq + rhs.dq,
        }
    }
}

impl Mul<f64> for State {
    type Output = State;

    fn mul(self, s: f64) -> State {
        State {
            y: self.y * s,
            dy: self.dy * s,
            q: self.q * s,
            dq: self.dq * s,
        }
    }
}

/// Coupling constants of the model. `C3 = 1 - C2` is derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalConstants {
    pub c1: f64,
    pub c2: f64,
}

impl PhysicalConstants {
    pub const fn new(c1: f64, c2: f64) -> Self {
        Self { c1, c2 }
    }

    pub fn c3(&self) -> f64 {
        1.0 - self.c2
    }
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self { c1: 0.2, c2: 0.7 }
    }
}

/// Right-hand side `ds/dt` of the electromechanical ODE.
///
/// ```text
/// y'  = dy
/// dy' = 0.5 - y - (C1/4) q^2
/// q'  = dq
/// dq' = -C2 q - 2 C3 q y
/// ```
#[inline]
pub fn derivatives(s: &State, c: &PhysicalConstants) -> State {
    let c3 = c.c3();
    State {
        y: s.dy,
        dy: 0.5 - s.y - (c.c1 / 4.0) * s.q * s.q,
        q: s.dq,
        dq: -c.c2 * s.q - 2.0 * c3 * s.q * s.y,
    }
}

/// Analytic Jacobian `d(ds/dt)/ds`, rows and columns in `(y, dy, q, dq)` order.
pub fn jacobian(s: &State, c: &PhysicalConstants) -> [[f64; STATE_LEN]; STATE_LEN] {
    let c3 = c.c3();
    [
        [0.0, 1.0, 0.0, 0.0],
        [-1.0, 0.0, -(c.c1 / 2.0) * s.q, 0.0],
        [0.0, 0.0, 0.0, 1.0],
        [-2.0 * c3 * s.q, 0.0, -c.c2 - 2.0 * c3 * s.y, 0.0],
    ]
}
