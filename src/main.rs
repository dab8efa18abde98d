//! share-inventory - Durable File Share Inventory Scanner
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use share_inventory::checkpoint::{load_run, CheckpointStore, NamespaceState, SqliteStore};
use share_inventory::config::{CliArgs, Command, ScanConfig, SinkArgs, SinkKind};
use share_inventory::progress::{format_number, print_header, print_summary, ProgressReporter};
use share_inventory::sink::build_sink;
use share_inventory::storage::LocalBackend;
use share_inventory::walker::{Coordinator, RunOutcome, RunReport};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();
    setup_logging(args.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(async {
        match args.command.clone() {
            None => run_scan(&args).await,
            Some(Command::Resume {
                execution_id,
                checkpoint_db,
                sink,
                quiet,
            }) => run_resume(&execution_id, &checkpoint_db, &sink, quiet).await,
            Some(Command::Inspect {
                execution_id,
                checkpoint_db,
            }) => run_inspect(execution_id.as_deref(), &checkpoint_db).await,
            #[cfg(feature = "server")]
            Some(Command::Serve {
                port,
                bind,
                checkpoint_db,
                sink,
            }) => run_serve(&bind, port, &checkpoint_db, &sink).await,
        }
    })
}

async fn run_scan(args: &CliArgs) -> Result<ExitCode> {
    let config = ScanConfig::from_args(args).context("Invalid configuration")?;
    let store = SqliteStore::open(&args.checkpoint_db).context("Failed to open checkpoint log")?;
    let coordinator = build_coordinator(&config.storage_account, &args.sink, store)?;

    if !args.quiet {
        print_header(&config.storage_account, &config.execution_id, sink_label(&args.sink));
    }

    let start = Instant::now();
    let progress = (!args.quiet).then(|| ProgressReporter::watch(coordinator.status()));
    let report = coordinator.run(config).await.context("Scan failed")?;
    finish(report, progress, start, args.quiet)
}

async fn run_resume(
    execution_id: &str,
    checkpoint_db: &Path,
    sink: &SinkArgs,
    quiet: bool,
) -> Result<ExitCode> {
    let store = SqliteStore::open(checkpoint_db).context("Failed to open checkpoint log")?;
    let run = load_run(&store, execution_id)
        .await
        .with_context(|| format!("Cannot load run '{}'", execution_id))?;
    let account = run.manifest.config.storage_account.clone();
    let coordinator = build_coordinator(&account, sink, store)?;

    if !quiet {
        print_header(&account, execution_id, sink_label(sink));
    }

    let start = Instant::now();
    let progress = (!quiet).then(|| ProgressReporter::watch(coordinator.status()));
    let report = coordinator.resume(execution_id).await.context("Resume failed")?;
    finish(report, progress, start, quiet)
}

async fn run_inspect(execution_id: Option<&str>, checkpoint_db: &Path) -> Result<ExitCode> {
    let store = SqliteStore::open(checkpoint_db).context("Failed to open checkpoint log")?;

    let Some(execution_id) = execution_id else {
        let runs = store.list_runs().await.context("Failed to list runs")?;
        if runs.is_empty() {
            println!("No runs recorded in {}", checkpoint_db.display());
        }
        for run in runs {
            println!("{}", run);
        }
        return Ok(ExitCode::SUCCESS);
    };

    let run = load_run(&store, execution_id)
        .await
        .with_context(|| format!("Cannot load run '{}'", execution_id))?;
    let config = &run.manifest.config;
    println!("Execution:  {}", execution_id);
    println!("Account:    {}", config.storage_account);
    println!("Started:    {}", config.scan_started_at.to_rfc3339());
    println!("Batch size: {}", config.batch_size);
    println!();

    for namespace in &run.manifest.namespaces {
        let line = match run.state(namespace) {
            Some(NamespaceState::Finished(result)) => format!(
                "{} ({} files, {} dirs, {} batches sent, {} failed, {} errors)",
                result.status,
                format_number(result.files_processed),
                format_number(result.directories_processed),
                result.batches_sent,
                result.batches_failed,
                result.error_count
            ),
            Some(NamespaceState::InProgress(wave)) => format!(
                "in progress after wave {} ({} files, {} queued dirs, {} pending records)",
                wave.wave_number,
                format_number(wave.counters.files_processed),
                wave.frontier.len(),
                wave.pending.len()
            ),
            Some(NamespaceState::NotStarted) | None => "not started".to_string(),
        };
        println!("  {:<24} {}", namespace, line);
    }

    if !run.is_finished() {
        println!();
        println!("Resume with: share-inventory resume {}", execution_id);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "server")]
async fn run_serve(bind: &str, port: u16, checkpoint_db: &Path, sink: &SinkArgs) -> Result<ExitCode> {
    use share_inventory::server::{serve, AppState, BackendFactory, RunRegistry};
    use share_inventory::storage::SharedBackend;

    let store = SqliteStore::open(checkpoint_db).context("Failed to open checkpoint log")?;
    let sink = build_sink(sink).context("Invalid sink configuration")?;
    let factory: BackendFactory =
        Arc::new(|account: &str| Ok(Arc::new(LocalBackend::new(account)) as SharedBackend));

    let state = AppState {
        runs: RunRegistry::new(),
        sink,
        store: Arc::new(store),
        backend_factory: factory,
    };
    serve(state, bind, port).await.context("Server failed")?;
    Ok(ExitCode::SUCCESS)
}

fn build_coordinator(account: &str, sink: &SinkArgs, store: SqliteStore) -> Result<Coordinator> {
    let backend = LocalBackend::new(account);
    let sink = build_sink(sink).context("Invalid sink configuration")?;
    let coordinator = Coordinator::new(Arc::new(backend), sink, Arc::new(store));

    let cancel = coordinator.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping at the next wave boundary...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    Ok(coordinator)
}

fn finish(
    report: RunReport,
    progress: Option<ProgressReporter>,
    start: Instant,
    quiet: bool,
) -> Result<ExitCode> {
    if let Some(p) = progress {
        p.finish(&format!("Run {}", report.status));
    }
    if !quiet {
        print_summary(&report, start.elapsed());
    }

    match report.status {
        RunOutcome::Cancelled => {
            info!(execution_id = %report.execution_id, "Run was cancelled before completion");
            eprintln!("Resume with: share-inventory resume {}", report.execution_id);
            Ok(ExitCode::from(130))
        }
        RunOutcome::Failed => Ok(ExitCode::FAILURE),
        RunOutcome::Completed | RunOutcome::NothingToDo => {
            if report.total_errors > 0 {
                info!(errors = report.total_errors, "Run completed with errors");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn sink_label(sink: &SinkArgs) -> &'static str {
    match sink.kind {
        SinkKind::Ndjson => "ndjson",
        SinkKind::Http => "http",
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("share_inventory=debug,warn")
    } else {
        EnvFilter::new("share_inventory=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
