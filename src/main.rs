//! Tessera batch runner - Main Entry Point
//!
//! Compiles a pipeline definition into one run per input file, then
//! executes the runs concurrently on the task scheduler, printing
//! `[done/total] run_id: Done|Error` progress as results arrive.

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tessera::{
    config::AppConfig,
    ops::{OpRegistry, EXPORT_DATA_OP, IMPORT_OP, SAVE_SESSION_OP},
    pipeline::{execute_run, PipelineCompiler, PipelineConfig, RunConfig, RunSummary},
    scheduler::{TaskEvent, TaskScheduler},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Execute Tessera pipelines from the command line
#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Execute Tessera pipelines from the command line", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration JSON file
    config: PathBuf,

    /// Input files to process (overrides the files listed in the pipeline)
    #[arg(long, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Directory for session archives and exports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of parallel workers (default: machine-sized)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Execute a single run by index (for job arrays)
    #[arg(short, long)]
    index: Option<usize>,

    /// List runs without executing
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Append logs to this file in addition to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The guard must outlive the run so buffered log lines flush on exit.
    let _log_guard = match init_tracing(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting Tessera batch runner");

    if !cli.config.exists() {
        eprintln!("Error: {} not found", cli.config.display());
        return ExitCode::FAILURE;
    }

    let app_config = AppConfig::load_or_default();

    let mut pipeline = match PipelineConfig::load(&cli.config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error reading pipeline: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Config-file import defaults fill settings the pipeline leaves unset;
    // an explicit --output-dir wins over both the pipeline and the config.
    for node in &mut pipeline.nodes {
        if node.operation_id == IMPORT_OP {
            app_config.import.apply_to(&mut node.settings);
        }
    }
    if let Some(dir) = &cli.output_dir {
        overlay_output_dir(&mut pipeline, dir, true);
    } else if let Some(dir) = &app_config.output_dir {
        overlay_output_dir(&mut pipeline, dir, false);
    }

    let registry = Arc::new(OpRegistry::with_builtins());

    let compiled = if cli.inputs.is_empty() {
        PipelineCompiler::compile_from_config(&pipeline, &registry)
    } else {
        PipelineCompiler::compile(&pipeline, &cli.inputs, &registry)
    };
    let mut runs = match compiled {
        Ok(runs) => runs,
        Err(e) => {
            eprintln!("Error generating runs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        println!("Total runs: {}", runs.len());
        for (index, run) in runs.iter().enumerate() {
            println!("  [{}] {}: {}", index, run.run_id, describe_operations(run));
        }
        return ExitCode::SUCCESS;
    }

    if let Some(index) = cli.index {
        if index >= runs.len() {
            eprintln!("Error: index {} out of range [0, {}]", index, runs.len() - 1);
            return ExitCode::FAILURE;
        }
        let run = runs.swap_remove(index);
        println!("Executing run {}: {}", index, run.run_id);
        return match execute_run(&run, &registry) {
            Ok(summary) => {
                println!("[1/1] {}: Done", summary.run_id);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("[1/1] {}: Error - {:#}", run.run_id, anyhow::Error::from(e));
                ExitCode::FAILURE
            }
        };
    }

    let mut scheduler_config = app_config.scheduler.clone();
    if cli.workers.is_some() {
        scheduler_config.max_workers = cli.workers;
    }

    execute_all(runs, &registry, TaskScheduler::from_config(&scheduler_config))
}

/// Run every compiled run on the scheduler, reporting progress from the
/// event stream.
fn execute_all(
    runs: Vec<RunConfig>,
    registry: &Arc<OpRegistry>,
    mut scheduler: TaskScheduler,
) -> ExitCode {
    let total = runs.len();

    for run in runs {
        let registry = Arc::clone(registry);
        let run_id = run.run_id.clone();
        scheduler.submit(
            run_id,
            move || Ok(execute_run(&run, &registry)?),
            |summary: RunSummary| {
                for artifact in &summary.artifacts {
                    tracing::debug!("Wrote {}", artifact.display());
                }
            },
        );
    }

    let mut done = 0usize;
    let mut failed = 0usize;
    while done < total {
        scheduler.pump();
        match scheduler.events().recv_timeout(Duration::from_millis(100)) {
            Ok(TaskEvent::Completed { name, .. }) => {
                done += 1;
                println!("[{}/{}] {}: Done", done, total, name);
            }
            Ok(TaskEvent::Failed { name, error, .. }) => {
                done += 1;
                failed += 1;
                eprintln!("[{}/{}] {}: Error - {}", done, total, name, error);
            }
            Ok(TaskEvent::Warning { name, message, .. }) => {
                eprintln!("{}: {}", name, message);
            }
            Ok(TaskEvent::Queued { .. } | TaskEvent::Started { .. }) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    scheduler.shutdown();

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Route persist and export steps at `dir`. When `force` is false the
/// pipeline's own `output_dir` settings are left untouched.
fn overlay_output_dir(pipeline: &mut PipelineConfig, dir: &Path, force: bool) {
    let dir = serde_json::Value::from(dir.to_string_lossy().into_owned());
    for node in &mut pipeline.nodes {
        if node.operation_id != SAVE_SESSION_OP && node.operation_id != EXPORT_DATA_OP {
            continue;
        }
        if force {
            node.settings.insert("output_dir".to_string(), dir.clone());
        } else {
            node.settings
                .entry("output_dir".to_string())
                .or_insert_with(|| dir.clone());
        }
    }
}

fn describe_operations(run: &RunConfig) -> String {
    run.operations
        .iter()
        .map(|op| op.operation_id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Initialize logging: env filter, stderr layer, optional file layer.
fn init_tracing(
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tessera=debug"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
