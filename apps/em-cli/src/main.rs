use clap::{Parser, ValueEnum};
use em_app::{
    AppResult, BatchConfig, BatchProgressEvent, BatchReport, BatchStage, ExecutionMode,
    RunOutcome, SolverChoice, batch_manifest, run_batch_with_progress,
};
use em_core::timing::{self, PerfStats, batch_timing};
use em_results::RunStore;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "em-cli")]
#[command(
    about = "Batch integrator for the electromechanical oscillator",
    long_about = None
)]
struct Cli {
    /// Batch configuration YAML (defaults apply to omitted fields)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding run outputs
    #[arg(long, default_value = "runs")]
    output: PathBuf,
    /// Solver backend
    #[arg(long, value_enum)]
    solver: Option<SolverArg>,
    /// Integrate runs on all cores
    #[arg(long)]
    parallel: bool,
    /// Number of initial conditions
    #[arg(long)]
    count: Option<usize>,
    /// End of the time horizon
    #[arg(long)]
    t_end: Option<f64>,
    /// Output time step
    #[arg(long)]
    dt: Option<f64>,
    /// Print a per-phase timing breakdown
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverArg {
    Rk4,
    Bdf,
    OdeSolvers,
}

impl From<SolverArg> for SolverChoice {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Rk4 => SolverChoice::Rk4,
            SolverArg::Bdf => SolverChoice::Bdf,
            SolverArg::OdeSolvers => SolverChoice::OdeSolvers,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.timing {
        timing::enable_timing();
    }

    match cmd_batch(&cli) {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> AppResult<BatchConfig> {
    let mut config = match &cli.config {
        Some(path) => BatchConfig::load(path)?,
        None => BatchConfig::default(),
    };

    if let Some(solver) = cli.solver {
        config.solver = solver.into();
    }
    if cli.parallel {
        config.execution = ExecutionMode::Parallel;
    }
    if let Some(count) = cli.count {
        config.count = count;
    }
    if let Some(t_end) = cli.t_end {
        config.t_end = t_end;
    }
    if let Some(dt) = cli.dt {
        config.dt = dt;
    }

    config.validate()?;
    Ok(config)
}

fn cmd_batch(cli: &Cli) -> AppResult<BatchReport> {
    let started = Instant::now();
    batch_timing::reset_all();

    let config = load_config(cli)?;
    let store = RunStore::new(cli.output.clone())?;
    let manifest = batch_manifest(&config);
    let writer = store.open_batch(&manifest)?;
    let setup_time_s = started.elapsed().as_secs_f64();

    println!(
        "Running {} trajectories with {} over [{}, {}], dt = {}",
        config.count,
        config.solver_kind().name(),
        config.t_start,
        config.t_end,
        config.dt
    );

    let mut last_emit = Instant::now();
    let report = run_batch_with_progress(
        &config,
        &writer,
        Some(&mut |event| {
            let emit_now = event.stage != BatchStage::RunWritten
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    let synced = writer.finish();
    match &synced {
        Ok(()) => println!("✓ Batch completed: {}", manifest.run_id),
        Err(e) => {
            tracing::error!(error = %e, "failed to sync groups file");
            println!("✗ Batch results may be incomplete: {}", manifest.run_id);
        }
    }
    println!("  Output: {}", store.root().join(&manifest.run_id).display());
    println!(
        "  Written: {}  Partial: {}  Skipped: {}",
        report.written(),
        report.partial(),
        report.skipped()
    );
    for run in &report.runs {
        match &run.outcome {
            RunOutcome::Written { .. } => {}
            RunOutcome::Partial { len, failure } => println!(
                "  ! {} halted at t = {:.6} after {} samples: {}",
                run.group, failure.t, len, failure.reason
            ),
            RunOutcome::Skipped { stage, reason } => {
                println!("  ✗ {} skipped ({:?}): {}", run.group, stage, reason)
            }
        }
    }

    let total_time_s = started.elapsed().as_secs_f64();
    println!("Total execution time: {:.3} s", total_time_s);

    PerfStats {
        setup_time_s,
        batch_time_s: report.elapsed_s,
        total_time_s,
        runs: report.runs.len(),
        steps: report.total_steps(),
        rhs_evals: report.total_rhs_evals(),
    }
    .print_summary();

    synced?;
    Ok(report)
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &BatchProgressEvent) {
    let width = 28usize;
    let fraction = event.fraction_complete();
    let filled = ((fraction * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    print!(
        "\r[{}] {:>6.2}%  {}/{} runs  elapsed={:.1}s  {}",
        bar,
        fraction * 100.0,
        event.completed,
        event.total,
        event.elapsed_wall_s,
        event.message.as_deref().unwrap_or("")
    );
    let _ = io::stdout().flush();
}
