//! Application service layer for the electromechanical batch integrator.
//!
//! Loads and validates batch configurations, drives the batch over a solver
//! backend and hands every trajectory to a storage writer.

pub mod batch;
pub mod config;
pub mod error;
pub mod progress;

pub use batch::{
    BatchReport, RunOutcome, RunRecord, SkipStage, run_batch, run_batch_with_progress, run_single,
};
pub use config::{
    BatchConfig, BdfSettings, ConstantsConfig, ExecutionMode, InitialMapping, SolverChoice,
};
pub use error::{AppError, AppResult};
pub use progress::{BatchProgressEvent, BatchStage};

/// Version recorded in manifests and mixed into run ids.
pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the manifest of a batch, timestamped now.
pub fn batch_manifest(config: &BatchConfig) -> em_results::BatchManifest {
    let spec = config.batch_spec();
    em_results::BatchManifest {
        run_id: em_results::compute_run_id(&spec, SOLVER_VERSION),
        timestamp: chrono::Utc::now().to_rfc3339(),
        solver_version: SOLVER_VERSION.to_string(),
        spec,
    }
}
