//! Persisted record types.

use em_core::TrajectoryColumns;
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub run_id: RunId,
    pub timestamp: String,
    pub solver_version: String,
    pub spec: BatchSpec,
}

/// Everything that determines the contents of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub count: usize,
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub solver: String,
    /// Settings of the adaptive backend, present only when it is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bdf: Option<BdfRecord>,
    pub constants: ConstantsRecord,
    pub mapping: MappingRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BdfRecord {
    pub rtol: f64,
    pub atol: f64,
    pub initial_step: f64,
    pub max_step: f64,
    pub max_num_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantsRecord {
    pub c1: f64,
    pub c2: f64,
}

/// Index to initial condition: `y0 = y0_start + i * y0_step`, the other
/// components fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub y0_start: f64,
    pub y0_step: f64,
    pub q0: f64,
    pub dy0: f64,
    pub dq0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialRecord {
    pub y: f64,
    pub dy: f64,
    pub q: f64,
    pub dq: f64,
}

/// One line of `groups.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub index: u32,
    pub initial: InitialRecord,
    pub variables: TrajectoryColumns,
}

impl GroupRecord {
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
