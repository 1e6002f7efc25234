//! Batch driver: integrate every initial condition of a batch and hand each
//! trajectory to a storage writer.
//!
//! Per-run failures never abort the batch. A run that cannot start is
//! skipped, a run that halts mid-way is written up to its last good state,
//! and a group the writer rejects is skipped. Only problems found before
//! the first run (bad configuration, bad backend settings) are errors.

use std::time::Instant;

use em_core::GroupId;
use em_core::timing::{Timer, batch_timing};
use em_results::TrajectoryWriter;
use em_sim::{
    ElectromechanicalSystem, SimError, Solution, SolveStats, SolverKind, StepFailure,
};
use rayon::prelude::*;

use crate::config::{BatchConfig, ExecutionMode};
use crate::error::AppResult;
use crate::progress::{BatchProgressEvent, BatchStage};

/// Why a run produced no stored group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    /// The run descriptor was rejected.
    Validation,
    /// The solver backend could not be set up for this run.
    BackendInit,
    /// The writer refused the group.
    Storage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Written { len: usize },
    Partial { len: usize, failure: StepFailure },
    Skipped { stage: SkipStage, reason: String },
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub index: u32,
    pub group: GroupId,
    pub outcome: RunOutcome,
    pub stats: SolveStats,
}

/// Result of a whole batch, one record per index in index order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub runs: Vec<RunRecord>,
    pub elapsed_s: f64,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Written { .. }))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Partial { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Skipped { .. }))
    }

    pub fn total_steps(&self) -> usize {
        self.runs.iter().map(|r| r.stats.steps).sum()
    }

    pub fn total_rhs_evals(&self) -> usize {
        self.runs.iter().map(|r| r.stats.rhs_evals).sum()
    }

    /// Process exit status for this batch.
    ///
    /// Per-run failures keep the status at 0. It is non-zero only when no
    /// run got as far as integrating.
    pub fn exit_code(&self) -> u8 {
        let integrated = self.runs.iter().any(|r| {
            !matches!(
                r.outcome,
                RunOutcome::Skipped {
                    stage: SkipStage::Validation | SkipStage::BackendInit,
                    ..
                }
            )
        });
        if self.runs.is_empty() || integrated { 0 } else { 1 }
    }

    fn count(&self, pred: impl Fn(&RunOutcome) -> bool) -> usize {
        self.runs.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// A run after its backend returned, before anything was written.
struct Integrated {
    index: u32,
    group: GroupId,
    result: Result<Solution, (SkipStage, String)>,
}

fn integrate_one(
    config: &BatchConfig,
    solver: &SolverKind,
    model: &ElectromechanicalSystem,
    index: u32,
) -> Integrated {
    let group = config.group_id(index);
    let result = match config.run_descriptor(index) {
        Err(e) => Err((SkipStage::Validation, e.to_string())),
        Ok(run) => {
            let timer = Timer::start("integrate");
            let solved = solver.integrate(model, &run);
            timer.stop_into(&batch_timing::INTEGRATE);
            solved.map_err(|e| match e {
                SimError::BackendInit { .. } => (SkipStage::BackendInit, e.to_string()),
                other => (SkipStage::Validation, other.to_string()),
            })
        }
    };
    Integrated {
        index,
        group,
        result,
    }
}

fn store_one<W: TrajectoryWriter + ?Sized>(writer: &W, run: Integrated) -> RunRecord {
    let Integrated {
        index,
        group,
        result,
    } = run;

    let solution = match result {
        Ok(solution) => solution,
        Err((stage, reason)) => {
            match stage {
                SkipStage::BackendInit => {
                    tracing::error!(%group, %reason, "solver backend failed to start, run skipped")
                }
                _ => tracing::warn!(%group, %reason, "run rejected, skipped"),
            }
            return RunRecord {
                index,
                group,
                outcome: RunOutcome::Skipped { stage, reason },
                stats: SolveStats::default(),
            };
        }
    };

    let Solution {
        trajectory,
        stats,
        failure,
    } = solution;
    let len = trajectory.len();

    let timer = Timer::start("columns");
    let columns = trajectory.into_columns();
    timer.stop_into(&batch_timing::COLUMNS);

    let timer = Timer::start("write");
    let written = writer.write_group(&group, columns);
    timer.stop_into(&batch_timing::WRITE);

    let outcome = match (written, failure) {
        (Err(e), _) => {
            tracing::error!(%group, error = %e, "storage rejected group, run skipped");
            RunOutcome::Skipped {
                stage: SkipStage::Storage,
                reason: e.to_string(),
            }
        }
        (Ok(()), Some(failure)) => {
            tracing::warn!(
                %group,
                t = failure.t,
                reason = %failure.reason,
                len,
                "run halted early, partial trajectory written"
            );
            RunOutcome::Partial { len, failure }
        }
        (Ok(()), None) => {
            tracing::debug!(%group, len, steps = stats.steps, "run written");
            RunOutcome::Written { len }
        }
    };

    RunRecord {
        index,
        group,
        outcome,
        stats,
    }
}

fn emit(
    progress_cb: &mut Option<&mut dyn FnMut(BatchProgressEvent)>,
    stage: BatchStage,
    index: Option<u32>,
    completed: usize,
    total: usize,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(BatchProgressEvent {
            stage,
            index,
            completed,
            total,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
        });
    }
}

/// Run a whole batch into `writer`.
pub fn run_batch<W: TrajectoryWriter + ?Sized>(
    config: &BatchConfig,
    writer: &W,
) -> AppResult<BatchReport> {
    run_batch_with_progress(config, writer, None)
}

/// Run a whole batch and stream progress events.
///
/// In parallel mode the `RunFinished` events arrive after every run has
/// finished, in index order, since the callback stays on the calling thread.
pub fn run_batch_with_progress<W: TrajectoryWriter + ?Sized>(
    config: &BatchConfig,
    writer: &W,
    mut progress_cb: Option<&mut dyn FnMut(BatchProgressEvent)>,
) -> AppResult<BatchReport> {
    config.validate()?;
    let solver = config.solver_kind();
    solver.validate()?;

    let model = config.model();
    let total = config.count;
    // validate() caps count at u32::MAX
    let count = total as u32;
    let started = Instant::now();

    tracing::info!(
        count = total,
        solver = solver.name(),
        mode = ?config.execution,
        t_start = config.t_start,
        t_end = config.t_end,
        dt = config.dt,
        "starting batch"
    );
    emit(
        &mut progress_cb,
        BatchStage::Started,
        None,
        0,
        total,
        started,
        Some(format!("{} runs with {}", total, solver.name())),
    );

    let mut runs = Vec::with_capacity(total);
    match config.execution {
        ExecutionMode::Sequential => {
            for index in 0..count {
                let integrated = integrate_one(config, &solver, &model, index);
                emit(
                    &mut progress_cb,
                    BatchStage::RunFinished,
                    Some(index),
                    runs.len(),
                    total,
                    started,
                    None,
                );
                let record = store_one(writer, integrated);
                report_stored(&mut progress_cb, &record, runs.len() + 1, total, started);
                runs.push(record);
            }
        }
        ExecutionMode::Parallel => {
            let integrated: Vec<Integrated> = (0..count)
                .into_par_iter()
                .map(|index| integrate_one(config, &solver, &model, index))
                .collect();
            for run in integrated {
                let index = run.index;
                emit(
                    &mut progress_cb,
                    BatchStage::RunFinished,
                    Some(index),
                    runs.len(),
                    total,
                    started,
                    None,
                );
                let record = store_one(writer, run);
                report_stored(&mut progress_cb, &record, runs.len() + 1, total, started);
                runs.push(record);
            }
        }
    }

    let report = BatchReport {
        runs,
        elapsed_s: started.elapsed().as_secs_f64(),
    };

    tracing::info!(
        written = report.written(),
        partial = report.partial(),
        skipped = report.skipped(),
        elapsed_s = report.elapsed_s,
        "batch finished"
    );
    emit(
        &mut progress_cb,
        BatchStage::Finished,
        None,
        total,
        total,
        started,
        Some(format!(
            "{} written, {} partial, {} skipped",
            report.written(),
            report.partial(),
            report.skipped()
        )),
    );

    Ok(report)
}

fn report_stored(
    progress_cb: &mut Option<&mut dyn FnMut(BatchProgressEvent)>,
    record: &RunRecord,
    completed: usize,
    total: usize,
    started: Instant,
) {
    if !matches!(record.outcome, RunOutcome::Skipped { .. }) {
        emit(
            progress_cb,
            BatchStage::RunWritten,
            Some(record.index),
            completed,
            total,
            started,
            Some(record.group.name()),
        );
    }
}

/// Integrate one index of the batch on its own, with the batch's mapping,
/// horizon and solver. Nothing is written.
pub fn run_single(config: &BatchConfig, index: u32) -> AppResult<Solution> {
    config.validate()?;
    let solver = config.solver_kind();
    let run = config.run_descriptor(index)?;
    tracing::debug!(index, solver = solver.name(), "running single index");
    Ok(solver.integrate(&config.model(), &run)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_results::MemoryWriter;

    fn small_config() -> BatchConfig {
        BatchConfig {
            count: 4,
            t_end: 1.0,
            dt: 0.1,
            ..BatchConfig::default()
        }
    }

    #[test]
    fn every_index_is_written_in_order() {
        let writer = MemoryWriter::new();
        let report = run_batch(&small_config(), &writer).unwrap();
        assert_eq!(report.written(), 4);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.total_steps(), 40);

        let groups = writer.into_groups();
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            ["run000_y0_q100", "run001_y1_q100", "run002_y2_q100", "run003_y3_q100"]
        );
        for g in &groups {
            assert_eq!(g.len(), 11);
        }
    }

    #[test]
    fn invalid_config_fails_before_any_run() {
        let config = BatchConfig {
            dt: -1.0,
            ..small_config()
        };
        let writer = MemoryWriter::new();
        assert!(run_batch(&config, &writer).is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn bad_backend_settings_fail_up_front() {
        let mut config = small_config();
        config.solver = crate::config::SolverChoice::Bdf;
        config.bdf.rtol = -1.0;
        let writer = MemoryWriter::new();
        assert!(run_batch(&config, &writer).is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn progress_reports_each_stage() {
        let writer = MemoryWriter::new();
        let mut stages = Vec::new();
        run_batch_with_progress(
            &small_config(),
            &writer,
            Some(&mut |e: BatchProgressEvent| stages.push(e.stage)),
        )
        .unwrap();

        assert_eq!(stages.first(), Some(&BatchStage::Started));
        assert_eq!(stages.last(), Some(&BatchStage::Finished));
        let written = stages.iter().filter(|s| **s == BatchStage::RunWritten).count();
        let finished = stages.iter().filter(|s| **s == BatchStage::RunFinished).count();
        assert_eq!((written, finished), (4, 4));
    }

    #[test]
    fn report_exit_code_only_fails_when_nothing_ran() {
        let skipped = |stage| RunRecord {
            index: 0,
            group: small_config().group_id(0),
            outcome: RunOutcome::Skipped {
                stage,
                reason: String::new(),
            },
            stats: SolveStats::default(),
        };
        let all_invalid = BatchReport {
            runs: vec![skipped(SkipStage::Validation), skipped(SkipStage::BackendInit)],
            elapsed_s: 0.0,
        };
        assert_eq!(all_invalid.exit_code(), 1);

        let storage = BatchReport {
            runs: vec![skipped(SkipStage::Validation), skipped(SkipStage::Storage)],
            elapsed_s: 0.0,
        };
        assert_eq!(storage.exit_code(), 0);
    }
}
