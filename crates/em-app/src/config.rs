//! Batch configuration: defaults, YAML loading and validation.

use crate::error::{AppError, AppResult};
use em_core::{GroupId, RunIndex, step_count};
use em_results::{BatchSpec, BdfRecord, ConstantsRecord, MappingRecord};
use em_sim::{
    BdfOptions, ElectromechanicalSystem, PhysicalConstants, RunDescriptor, SolverKind, State,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Solver backend named in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverChoice {
    #[default]
    Rk4,
    Bdf,
    OdeSolvers,
}

/// How runs are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One run at a time, memory bounded by one trajectory.
    #[default]
    Sequential,
    /// Runs fan out across rayon workers, written after all have finished.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BdfSettings {
    pub rtol: f64,
    pub atol: f64,
    pub initial_step: f64,
    pub max_step: f64,
    pub max_num_steps: usize,
}

impl Default for BdfSettings {
    fn default() -> Self {
        let opts = BdfOptions::default();
        Self {
            rtol: opts.rtol,
            atol: opts.atol,
            initial_step: opts.initial_step,
            max_step: opts.max_step,
            max_num_steps: opts.max_num_steps,
        }
    }
}

impl From<BdfSettings> for BdfOptions {
    fn from(s: BdfSettings) -> Self {
        BdfOptions {
            rtol: s.rtol,
            atol: s.atol,
            initial_step: s.initial_step,
            max_step: s.max_step,
            max_num_steps: s.max_num_steps,
        }
    }
}

/// Index to initial condition: `y0 = y0_start + i * y0_step`, the remaining
/// components fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitialMapping {
    pub y0_start: f64,
    pub y0_step: f64,
    pub q0: f64,
    pub dy0: f64,
    pub dq0: f64,
}

impl Default for InitialMapping {
    fn default() -> Self {
        Self {
            y0_start: 0.0,
            y0_step: 0.1,
            q0: 1.0,
            dy0: 0.0,
            dq0: 0.0,
        }
    }
}

impl InitialMapping {
    pub fn state(&self, index: u32) -> State {
        State::new(
            self.y0_start + f64::from(index) * self.y0_step,
            self.dy0,
            self.q0,
            self.dq0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstantsConfig {
    pub c1: f64,
    pub c2: f64,
}

impl Default for ConstantsConfig {
    fn default() -> Self {
        let c = PhysicalConstants::default();
        Self { c1: c.c1, c2: c.c2 }
    }
}

/// Full description of one batch.
///
/// Every field has a default; an empty YAML document yields the standard
/// ten-run batch over `[0, 5000]` with `dt = 0.001`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub count: usize,
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub solver: SolverChoice,
    pub bdf: BdfSettings,
    pub execution: ExecutionMode,
    pub initial: InitialMapping,
    pub constants: ConstantsConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            t_start: 0.0,
            t_end: 5000.0,
            dt: 0.001,
            solver: SolverChoice::default(),
            bdf: BdfSettings::default(),
            execution: ExecutionMode::default(),
            initial: InitialMapping::default(),
            constants: ConstantsConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let config: BatchConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject configurations that cannot start a single run.
    pub fn validate(&self) -> AppResult<()> {
        if self.count == 0 {
            return Err(AppError::InvalidInput(
                "count must be at least 1".to_string(),
            ));
        }
        if u32::try_from(self.count).is_err() {
            return Err(AppError::InvalidInput(format!(
                "count {} exceeds the supported maximum {}",
                self.count,
                u32::MAX
            )));
        }

        step_count(self.t_start, self.t_end, self.dt)?;

        for (what, value) in [
            ("initial.y0_start", self.initial.y0_start),
            ("initial.y0_step", self.initial.y0_step),
            ("initial.q0", self.initial.q0),
            ("initial.dy0", self.initial.dy0),
            ("initial.dq0", self.initial.dq0),
            ("constants.c1", self.constants.c1),
            ("constants.c2", self.constants.c2),
        ] {
            if !value.is_finite() {
                return Err(AppError::InvalidInput(format!(
                    "{what} must be finite, got {value}"
                )));
            }
        }

        Ok(())
    }

    pub fn physical_constants(&self) -> PhysicalConstants {
        PhysicalConstants::new(self.constants.c1, self.constants.c2)
    }

    pub fn model(&self) -> ElectromechanicalSystem {
        ElectromechanicalSystem::new(self.physical_constants())
    }

    pub fn solver_kind(&self) -> SolverKind {
        match self.solver {
            SolverChoice::Rk4 => SolverKind::Rk4,
            SolverChoice::Bdf => SolverKind::Bdf(self.bdf.into()),
            SolverChoice::OdeSolvers => SolverKind::OdeSolversRk4,
        }
    }

    pub fn initial_state(&self, index: u32) -> State {
        self.initial.state(index)
    }

    pub fn group_id(&self, index: u32) -> GroupId {
        let s = self.initial_state(index);
        GroupId::new(RunIndex::from_index(index), s.y, s.q)
    }

    pub fn run_descriptor(&self, index: u32) -> em_sim::SimResult<RunDescriptor> {
        RunDescriptor::new(self.initial_state(index), self.t_start, self.t_end, self.dt)
    }

    /// The content that identifies the batch's results. Execution mode is
    /// left out since it never changes them.
    pub fn batch_spec(&self) -> BatchSpec {
        BatchSpec {
            count: self.count,
            t_start: self.t_start,
            t_end: self.t_end,
            dt: self.dt,
            solver: self.solver_kind().name().to_string(),
            bdf: (self.solver == SolverChoice::Bdf).then_some(BdfRecord {
                rtol: self.bdf.rtol,
                atol: self.bdf.atol,
                initial_step: self.bdf.initial_step,
                max_step: self.bdf.max_step,
                max_num_steps: self.bdf.max_num_steps,
            }),
            constants: ConstantsRecord {
                c1: self.constants.c1,
                c2: self.constants.c2,
            },
            mapping: MappingRecord {
                y0_start: self.initial.y0_start,
                y0_step: self.initial.y0_step,
                q0: self.initial.q0,
                dy0: self.initial.dy0,
                dq0: self.initial.dq0,
            },
        }
    }
}
