//! Time integration of the electromechanical oscillator.
//!
//! Provides:
//! - State vector, physical constants and the shared right-hand side
//! - Fixed-step RK4 integrator and trajectory recorder
//! - Adaptive BDF backend and an `ode_solvers` RK4 adapter
//! - Solver strategy selection over a validated run descriptor

pub mod bdf;
pub mod error;
pub mod integrator;
pub mod model;
pub mod odeint;
pub mod recorder;
pub mod run;
pub mod solver;
pub mod state;

// Re-exports for public API
pub use bdf::{Bdf, BdfOptions};
pub use error::{SimError, SimResult};
pub use integrator::{Integrator, RK4};
pub use model::{ElectromechanicalSystem, TransientModel};
pub use odeint::OdeSolversRk4;
pub use recorder::{Snapshot, Trajectory, TrajectoryRecorder};
pub use run::RunDescriptor;
pub use solver::{Solution, SolveStats, SolverKind, StepFailure, run_fixed_step};
pub use state::{PhysicalConstants, STATE_LEN, State, derivatives, jacobian};
