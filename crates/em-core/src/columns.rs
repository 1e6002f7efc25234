//! Column layout of a persisted trajectory.

use crate::{CoreError, CoreResult};

/// Names of the persisted variables, in write order.
pub const VARIABLE_NAMES: [&str; 5] = ["time", "y", "q", "dy", "dq"];

/// Five equal-length arrays holding one trajectory: `time, y, q, dy, dq`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryColumns {
    pub time: Vec<f64>,
    pub y: Vec<f64>,
    pub q: Vec<f64>,
    pub dy: Vec<f64>,
    pub dq: Vec<f64>,
}

impl TrajectoryColumns {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            q: Vec::with_capacity(capacity),
            dy: Vec::with_capacity(capacity),
            dq: Vec::with_capacity(capacity),
        }
    }

    /// Reserve room for `additional` more samples in every column.
    pub fn reserve(&mut self, additional: usize) {
        self.time.reserve(additional);
        self.y.reserve(additional);
        self.q.reserve(additional);
        self.dy.reserve(additional);
        self.dq.reserve(additional);
    }

    /// Append one sample.
    pub fn push(&mut self, time: f64, y: f64, dy: f64, q: f64, dq: f64) {
        self.time.push(time);
        self.y.push(y);
        self.q.push(q);
        self.dy.push(dy);
        self.dq.push(dq);
    }

    /// Number of samples, taken from the time column.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Iterate `(name, values)` pairs in write order.
    pub fn variables(&self) -> [(&'static str, &[f64]); 5] {
        [
            (VARIABLE_NAMES[0], self.time.as_slice()),
            (VARIABLE_NAMES[1], self.y.as_slice()),
            (VARIABLE_NAMES[2], self.q.as_slice()),
            (VARIABLE_NAMES[3], self.dy.as_slice()),
            (VARIABLE_NAMES[4], self.dq.as_slice()),
        ]
    }

    /// Check that every column has the same length as `time`.
    pub fn check_lengths(&self) -> CoreResult<usize> {
        let expected = self.time.len();
        for (name, values) in self.variables() {
            if values.len() != expected {
                return Err(CoreError::LengthMismatch {
                    what: name,
                    expected,
                    got: values.len(),
                });
            }
        }
        Ok(expected)
    }
}
