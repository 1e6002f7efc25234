//! Snapshot recording and the finished trajectory.

use crate::error::{SimError, SimResult};
use crate::run::RunDescriptor;
use crate::state::State;
use em_core::TrajectoryColumns;

/// Upper bound on the up-front reservation; longer runs grow on demand.
const MAX_RESERVE: usize = 1 << 24;

/// Snapshots moved into columns before the snapshot buffer is shrunk.
const RELEASE_CHUNK: usize = 1 << 20;

/// One time-tagged state sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    pub time: f64,
    pub state: State,
}

/// Ordered snapshots of one run, strictly increasing in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    snapshots: Vec<Snapshot>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn first(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Column layout used by the storage writer (`time, y, q, dy, dq`).
    pub fn to_columns(&self) -> TrajectoryColumns {
        let mut cols = TrajectoryColumns::with_capacity(self.snapshots.len());
        for snap in &self.snapshots {
            let s = snap.state;
            cols.push(snap.time, s.y, s.dy, s.q, s.dq);
        }
        cols
    }

    /// Consume the trajectory into columns, releasing snapshot memory chunk
    /// by chunk so both layouts are never held in full at once.
    pub fn into_columns(self) -> TrajectoryColumns {
        drain_into_columns(self.snapshots, RELEASE_CHUNK)
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

fn drain_into_columns(mut pending: Vec<Snapshot>, chunk: usize) -> TrajectoryColumns {
    if pending.len() <= chunk {
        let mut cols = TrajectoryColumns::with_capacity(pending.len());
        for snap in pending {
            let s = snap.state;
            cols.push(snap.time, s.y, s.dy, s.q, s.dq);
        }
        return cols;
    }

    // Oldest snapshot last, so each chunk comes off the tail.
    pending.reverse();
    let mut cols = TrajectoryColumns::default();
    while !pending.is_empty() {
        let keep = pending.len().saturating_sub(chunk);
        cols.reserve(pending.len() - keep);
        for snap in pending.drain(keep..).rev() {
            let s = snap.state;
            cols.push(snap.time, s.y, s.dy, s.q, s.dq);
        }
        pending.shrink_to_fit();
    }
    cols
}

/// Append-only recorder for one run.
///
/// Seeded with the initial condition, fed one snapshot per step, then
/// finalized exactly once.
#[derive(Debug)]
pub struct TrajectoryRecorder {
    snapshots: Vec<Snapshot>,
    finalized: bool,
}

impl TrajectoryRecorder {
    /// Start a recording whose first snapshot is `(t_start, initial)`.
    pub fn initialize(run: &RunDescriptor) -> Self {
        let mut snapshots = Vec::with_capacity(run.expected_len().min(MAX_RESERVE));
        snapshots.push(Snapshot {
            time: run.t_start(),
            state: *run.initial(),
        });
        Self {
            snapshots,
            finalized: false,
        }
    }

    /// Append a snapshot. Time must be strictly greater than the last one
    /// and the state must be finite.
    pub fn record(&mut self, time: f64, state: State) -> SimResult<()> {
        if self.finalized {
            return Err(SimError::InvalidState {
                what: "recorder already finalized",
            });
        }
        if !time.is_finite() {
            return Err(SimError::NonFinite { what: "time", value: time });
        }
        if let Some(last) = self.snapshots.last()
            && time <= last.time
        {
            return Err(SimError::InvalidState {
                what: "snapshot time must increase strictly",
            });
        }
        if let Some((what, value)) = state.first_non_finite() {
            return Err(SimError::NonFinite { what, value });
        }
        self.snapshots.push(Snapshot { time, state });
        Ok(())
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Hand over the completed trajectory. Only the first call succeeds.
    pub fn finalize(&mut self) -> SimResult<Trajectory> {
        if self.finalized {
            return Err(SimError::InvalidState {
                what: "recorder already finalized",
            });
        }
        self.finalized = true;
        Ok(Trajectory {
            snapshots: std::mem::take(&mut self.snapshots),
        })
    }
}
