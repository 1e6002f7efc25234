use core::fmt;
use core::num::NonZeroU32;

/// Position of a run inside a batch.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<RunIndex>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunIndex(NonZeroU32);

impl RunIndex {
    /// Create a RunIndex from a 0-based index by storing index+1.
    ///
    /// `u32::MAX` has no representation; use [`RunIndex::try_from_index`]
    /// when the index is not already bounded by a validated batch size.
    pub fn from_index(index: u32) -> Self {
        match Self::try_from_index(index) {
            Some(id) => id,
            None => panic!("run index {index} is out of range"),
        }
    }

    pub fn try_from_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(NonZeroU32::new).map(Self)
    }

    /// Recover the 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for RunIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunIndex({})", self.index())
    }
}

impl fmt::Display for RunIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Identifier of one persisted trajectory group.
///
/// Carries the batch index together with the exact initial displacement and
/// charge, so two runs whose rounded labels coincide (`y0 = 0.05` and
/// `y0 = 0.1`) still get distinct names.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupId {
    pub index: RunIndex,
    pub y0: f64,
    pub q0: f64,
}

impl GroupId {
    pub fn new(index: RunIndex, y0: f64, q0: f64) -> Self {
        Self { index, y0, q0 }
    }

    /// Persisted group name: `run{index:03}_y{round(y0*10)}_q{round(q0*100)}`.
    pub fn name(&self) -> String {
        format!(
            "run{:03}_y{}_q{}",
            self.index.index(),
            (self.y0 * 10.0).round() as i64,
            (self.q0 * 100.0).round() as i64
        )
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
