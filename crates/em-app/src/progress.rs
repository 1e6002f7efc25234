/// Stage of a batch reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Started,
    /// One run left its solver backend (or was skipped before reaching it).
    RunFinished,
    /// One run's trajectory was accepted by the storage writer.
    RunWritten,
    Finished,
}

#[derive(Debug, Clone)]
pub struct BatchProgressEvent {
    pub stage: BatchStage,
    pub index: Option<u32>,
    pub completed: usize,
    pub total: usize,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl BatchProgressEvent {
    pub fn fraction_complete(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
