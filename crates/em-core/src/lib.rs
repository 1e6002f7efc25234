//! em-core: shared foundation for the electromechanical batch integrator.
//!
//! Contains:
//! - error (shared error type)
//! - numeric (Real + finiteness check + output grid)
//! - ids (run indices and trajectory group identifiers)
//! - columns (persisted column layout of a trajectory)
//! - timing (opt-in wall-clock instrumentation)

pub mod columns;
pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use columns::TrajectoryColumns;
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
