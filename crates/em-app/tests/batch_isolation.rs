use em_app::{
    BatchConfig, ExecutionMode, RunOutcome, SkipStage, SolverChoice, batch_manifest, run_batch,
    run_single,
};
use em_core::{GroupId, TrajectoryColumns};
use em_results::{MemoryWriter, ResultsError, ResultsResult, RunStore, TrajectoryWriter};

fn config(execution: ExecutionMode) -> BatchConfig {
    BatchConfig {
        count: 10,
        t_end: 10.0,
        dt: 0.01,
        execution,
        ..BatchConfig::default()
    }
}

/// Rejects one group by index and forwards the rest.
struct RejectingWriter {
    reject: u32,
    inner: MemoryWriter,
}

impl TrajectoryWriter for RejectingWriter {
    fn write_group(&self, group: &GroupId, columns: TrajectoryColumns) -> ResultsResult<()> {
        if group.index.index() == self.reject {
            return Err(ResultsError::Definition {
                group: group.name(),
                what: "rejected by test".to_string(),
            });
        }
        self.inner.write_group(group, columns)
    }
}

#[test]
fn single_run_equals_its_batch_member() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let cfg = config(mode);
        let alone = run_single(&cfg, 3).unwrap();
        assert!(alone.is_complete());

        let writer = MemoryWriter::new();
        let report = run_batch(&cfg, &writer).unwrap();
        assert_eq!(report.written(), 10);

        let groups = writer.into_groups();
        assert_eq!(groups[3].name, "run003_y3_q100");
        assert_eq!(groups[3].variables, alone.trajectory.to_columns());
    }
}

#[test]
fn parallel_and_sequential_batches_match() {
    let seq = MemoryWriter::new();
    run_batch(&config(ExecutionMode::Sequential), &seq).unwrap();
    let par = MemoryWriter::new();
    run_batch(&config(ExecutionMode::Parallel), &par).unwrap();
    assert_eq!(seq.into_groups(), par.into_groups());
}

#[test]
fn rejected_group_does_not_stop_the_batch() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let writer = RejectingWriter {
            reject: 4,
            inner: MemoryWriter::new(),
        };
        let report = run_batch(&config(mode), &writer).unwrap();

        assert_eq!(report.runs.len(), 10);
        assert_eq!(report.written(), 9);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.exit_code(), 0);
        assert!(matches!(
            report.runs[4].outcome,
            RunOutcome::Skipped {
                stage: SkipStage::Storage,
                ..
            }
        ));

        let indices: Vec<u32> = writer.inner.into_groups().iter().map(|g| g.index).collect();
        assert_eq!(indices, [0, 1, 2, 3, 5, 6, 7, 8, 9]);
    }
}

#[test]
fn halted_run_is_written_partially() {
    let mut cfg = config(ExecutionMode::Sequential);
    cfg.count = 2;
    cfg.solver = SolverChoice::Bdf;
    cfg.bdf.max_num_steps = 40;

    let writer = MemoryWriter::new();
    let report = run_batch(&cfg, &writer).unwrap();
    assert_eq!(report.partial(), 2);
    assert_eq!(report.exit_code(), 0);

    for (run, group) in report.runs.iter().zip(writer.into_groups()) {
        match &run.outcome {
            RunOutcome::Partial { len, failure } => {
                assert_eq!(*len, group.len());
                assert!(*len < 1001);
                assert!(failure.t < cfg.t_end);
                assert_eq!(group.variables.check_lengths().unwrap(), *len);
            }
            other => panic!("expected a partial run, got {other:?}"),
        }
    }
}

#[test]
fn batch_lands_in_the_run_store() {
    let root = std::env::temp_dir().join(format!("em_app_store_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);

    let mut cfg = config(ExecutionMode::Parallel);
    cfg.count = 3;
    cfg.t_end = 1.0;
    cfg.dt = 0.5;

    let store = RunStore::new(root.clone()).unwrap();
    let manifest = batch_manifest(&cfg);
    let writer = store.open_batch(&manifest).unwrap();
    let report = run_batch(&cfg, &writer).unwrap();
    writer.finish().unwrap();
    assert_eq!(report.written(), 3);

    let loaded = store.load_manifest(&manifest.run_id).unwrap();
    assert_eq!(loaded.spec, cfg.batch_spec());
    let groups = store.load_groups(&manifest.run_id).unwrap();
    assert_eq!(groups.len(), 3);
    for (i, g) in groups.iter().enumerate() {
        assert_eq!(g.index, i as u32);
        assert_eq!(g.variables.time, vec![0.0, 0.5, 1.0]);
        assert_eq!(g.initial.q, 1.0);
    }

    std::fs::remove_dir_all(root).unwrap();
}
