use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use ntds_ingest::backend::factory_for;
use ntds_ingest::config::{FilenamePattern, ImportConfig, DEFAULT_BACKEND};
use ntds_ingest::source::JsonExportOpener;
use ntds_ingest::{ImportOrchestrator, Interrupt, JobStatus, ProgressDisplay, ProgressHub, TableSummary};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ntds-ingest")]
#[command(about = "Import directory database exports into typed, indexed tables")]
struct Args {
    /// Source files to import
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Destination of a source file; give it once per file
    #[arg(short = 'C', long = "connection", value_name = "DEST")]
    connection: Vec<String>,

    /// Comma-separated destinations, in file order
    #[arg(long = "C-list", value_name = "LIST")]
    c_list: Option<String>,

    /// Destination built from each filename: FORMAT with %s replaced by the
    /// result of the postfix PROGRAM (e.g. "/out/%s.db" "basename rmext lower")
    #[arg(long = "C-from-filename", num_args = 2, value_names = ["FORMAT", "PROGRAM"])]
    c_from_filename: Option<Vec<String>>,

    /// Storage backend
    #[arg(short = 'B', long, env = "NTDS_INGEST_BACKEND", default_value = DEFAULT_BACKEND)]
    backend: String,

    /// Import only this table (sdtable, linktable, datatable)
    #[arg(long, default_value = "")]
    only: String,

    /// Append to existing tables
    #[arg(long)]
    append: bool,

    /// Drop and recreate existing tables
    #[arg(long)]
    overwrite: bool,

    #[arg(long)]
    no_post_processing: bool,

    /// Do not import anything, only run post-processing
    #[arg(long)]
    only_post_processing: bool,

    /// Run one job per worker in parallel
    #[arg(long)]
    multi: bool,

    /// Number of workers with --multi (default: number of CPUs)
    #[arg(long)]
    proc_num: Option<usize>,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// More logging (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Less logging (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,
}

impl Args {
    fn to_config(&self) -> ImportConfig {
        ImportConfig {
            files: self.files.clone(),
            destinations: self.connection.clone(),
            destination_list: self.c_list.clone(),
            destination_pattern: self.c_from_filename.as_ref().and_then(|v| match v.as_slice() {
                [format, program] => Some(FilenamePattern {
                    format: format.clone(),
                    program: program.clone(),
                }),
                _ => None,
            }),
            backend: self.backend.clone(),
            only: self.only.clone(),
            append: self.append,
            overwrite: self.overwrite,
            no_post_processing: self.no_post_processing,
            only_post_processing: self.only_post_processing,
            multi: self.multi,
            proc_num: self.proc_num,
            yes: self.yes,
        }
    }
}

/// INFO by default, one step per -v / -q; RUST_LOG wins when set.
fn init_tracing(verbose: u8, quiet: u8) {
    const LEVELS: [LevelFilter; 5] = [
        LevelFilter::ERROR,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let step = (2 + i32::from(verbose) - i32::from(quiet)).clamp(0, 4) as usize;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LEVELS[step].to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Ask on stderr until the answer is y or n; end of input counts as n.
fn confirm() -> Result<bool> {
    let mut stdin = io::stdin().lock();
    loop {
        eprint!("Can I carry on ? (y/n) ");
        io::stderr().flush()?;
        let mut answer = String::new();
        if stdin.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        if let Some(yes) = parse_answer(&answer) {
            return Ok(yes);
        }
    }
}

fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// First Ctrl-C stops dispatching; it also stops running work when jobs run
/// one at a time. In parallel runs a second Ctrl-C stops running jobs.
async fn watch_interrupts(dispatch_halt: Interrupt, abort: Interrupt, parallel: bool) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    dispatch_halt.trip();
    if !parallel {
        warn!("Interrupted, stopping the current job");
        abort.trip();
        return;
    }
    warn!("Interrupted, no further job will be started (Ctrl-C again stops running jobs)");
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted again, stopping running jobs");
        abort.trip();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    let config = args.to_config();
    let plan = config.plan().context("Invalid configuration")?;
    let backends = factory_for(&config.backend).context("Invalid configuration")?;

    if plan.needs_confirmation() && !confirm()? {
        info!("Nothing imported");
        return Ok(());
    }

    let parallel = plan.options.workers > 1 && plan.jobs.len() > 1;
    let orchestrator = Arc::new(
        ImportOrchestrator::new(plan, Arc::new(JsonExportOpener), backends)
            .with_post_processor(Box::new(TableSummary)),
    );

    let display = if args.no_progress {
        ProgressDisplay::Hidden
    } else {
        ProgressDisplay::Terminal
    };
    let hub = ProgressHub::start(display);
    let reporter = hub.reporter();

    let signals = tokio::spawn(watch_interrupts(
        orchestrator.dispatch_halt(),
        orchestrator.abort_handle(),
        parallel,
    ));
    let runner = orchestrator.clone();
    let reports = tokio::task::spawn_blocking(move || runner.run(&reporter))
        .await
        .context("Import run panicked")?;
    signals.abort();

    for snapshot in hub.finish() {
        debug!("{}: {}/{}", snapshot.name, snapshot.completed, snapshot.total);
    }

    let mut failed = 0;
    for report in &reports {
        let source = report.job.source_file.display();
        match &report.status {
            JobStatus::Completed { tables } => {
                let records: u64 = tables.iter().map(|t| t.records).sum();
                info!("{} -> {}: {} records in {} table(s)", source, report.job.destination, records, tables.len());
            }
            JobStatus::Interrupted => warn!("{} -> {}: interrupted", source, report.job.destination),
            JobStatus::NotStarted => warn!("{} -> {}: not started", source, report.job.destination),
            JobStatus::Failed(reason) => {
                failed += 1;
                error!("{} -> {}: {}", source, report.job.destination, reason);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} job(s) failed", failed, reports.len());
    }
    Ok(())
}
