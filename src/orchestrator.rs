//! Import Orchestrator - Runs one full import pipeline per (file, destination)
//!
//! Jobs run either one after the other in the calling thread, or on a bounded
//! pool of scoped worker threads fed through a rendezvous channel. Each job owns
//! its record source, backend connection and audit session; the only thing
//! workers share is the progress reporter.

use crate::audit::{AuditSession, SessionStatus};
use crate::backend::{Backend, BackendFactory, TableMode};
use crate::config::{ImportConfig, ImportPlan};
use crate::error::{ImportError, Result};
use crate::importer::{ImportContext, TableImporter, TableReport};
use crate::interrupt::Interrupt;
use crate::postprocess::PostProcessor;
use crate::progress::ProgressReporter;
use crate::schema::{spec_for, SchemaResolver, TableKind};
use crate::source::SourceOpener;
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One (source file, destination) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    pub source_file: PathBuf,
    pub destination: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed { tables: Vec<TableReport> },
    Interrupted,
    Failed(String),
    /// Never dispatched because the run was halted first
    NotStarted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: ImportJob,
    pub status: JobStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Table kinds to import, in import order
    pub tables: Vec<TableKind>,
    pub mode: TableMode,
    pub post_process: bool,
    pub only_post_processing: bool,
    /// 1 runs jobs sequentially in the calling thread
    pub workers: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tables: TableKind::ORDERED.to_vec(),
            mode: TableMode::Create,
            post_process: true,
            only_post_processing: false,
            workers: 1,
        }
    }
}

pub struct ImportOrchestrator {
    jobs: Vec<ImportJob>,
    options: RunOptions,
    opener: Arc<dyn SourceOpener>,
    backends: Arc<dyn BackendFactory>,
    post_processors: Vec<Box<dyn PostProcessor>>,
    resolver: SchemaResolver,
    dispatch_halt: Interrupt,
    abort: Interrupt,
    job_interrupts: Vec<Interrupt>,
}

impl ImportOrchestrator {
    pub fn new(
        plan: ImportPlan,
        opener: Arc<dyn SourceOpener>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        let abort = Interrupt::new();
        let job_interrupts = plan.jobs.iter().map(|_| abort.child()).collect();
        Self {
            jobs: plan.jobs,
            options: plan.options,
            opener,
            backends,
            post_processors: Vec::new(),
            resolver: SchemaResolver::new(),
            dispatch_halt: Interrupt::new(),
            abort,
            job_interrupts,
        }
    }

    /// Validate `config` completely before any source or backend is touched.
    pub fn from_config(
        config: &ImportConfig,
        opener: Arc<dyn SourceOpener>,
        backends: Arc<dyn BackendFactory>,
    ) -> Result<Self> {
        Ok(Self::new(config.plan()?, opener, backends))
    }

    pub fn with_post_processor(mut self, processor: Box<dyn PostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    pub fn with_resolver(mut self, resolver: SchemaResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn jobs(&self) -> &[ImportJob] {
        &self.jobs
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Tripping this stops the dispatch of queued jobs.
    pub fn dispatch_halt(&self) -> Interrupt {
        self.dispatch_halt.clone()
    }

    /// Tripping this interrupts every in-flight job.
    pub fn abort_handle(&self) -> Interrupt {
        self.abort.clone()
    }

    /// Token interrupting only the job at `index`.
    pub fn job_interrupt(&self, index: usize) -> Option<Interrupt> {
        self.job_interrupts.get(index).cloned()
    }

    /// Run every job and report on each, in job order. No job error escapes.
    pub fn run(&self, progress: &ProgressReporter) -> Vec<JobReport> {
        info!(
            "Running {} job(s) with {} worker(s)",
            self.jobs.len(),
            self.options.workers
        );
        let statuses = if self.options.workers <= 1 || self.jobs.len() <= 1 {
            self.run_sequential(progress)
        } else {
            self.run_parallel(progress)
        };
        self.jobs
            .iter()
            .cloned()
            .zip(statuses)
            .map(|(job, status)| JobReport { job, status })
            .collect()
    }

    fn run_sequential(&self, progress: &ProgressReporter) -> Vec<JobStatus> {
        let mut statuses = vec![JobStatus::NotStarted; self.jobs.len()];
        for (index, status) in statuses.iter_mut().enumerate() {
            if self.dispatch_halt.is_set() {
                warn!("Run halted, {} job(s) not started", self.jobs.len() - index);
                break;
            }
            *status = self.run_job(index, progress);
            if *status == JobStatus::Interrupted {
                self.dispatch_halt.trip();
            }
        }
        statuses
    }

    fn run_parallel(&self, progress: &ProgressReporter) -> Vec<JobStatus> {
        let workers = self.options.workers.min(self.jobs.len());
        let (job_tx, job_rx) = bounded::<usize>(0);
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, JobStatus)>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let progress = progress.clone();
                scope.spawn(move || {
                    for index in job_rx {
                        // A hand-off already pending when the halt tripped.
                        if self.dispatch_halt.is_set() {
                            warn!("Run halted, job {} not started", index);
                            continue;
                        }
                        let status = self.run_job(index, &progress);
                        if status == JobStatus::Interrupted {
                            self.dispatch_halt.trip();
                        }
                        if done_tx.send((index, status)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(done_tx);

            for index in 0..self.jobs.len() {
                if self.dispatch_halt.is_set() {
                    warn!("Run halted, {} job(s) not dispatched", self.jobs.len() - index);
                    break;
                }
                if job_tx.send(index).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });

        let mut statuses = vec![JobStatus::NotStarted; self.jobs.len()];
        for (index, status) in done_rx.try_iter() {
            statuses[index] = status;
        }
        statuses
    }

    /// Full pipeline of one job; every outcome is turned into a status.
    fn run_job(&self, index: usize, progress: &ProgressReporter) -> JobStatus {
        let job = &self.jobs[index];
        let interrupt = &self.job_interrupts[index];
        info!("Job {}: {} -> {}", index, job.source_file.display(), job.destination);

        let mut backend = match self.backends.connect(&job.destination) {
            Ok(backend) => backend,
            Err(e) => {
                error!("Job {} [{}] failed: {}", index, job.destination, e);
                return JobStatus::Failed(e.to_string());
            }
        };
        let audit = match AuditSession::open(backend.as_mut()) {
            Ok(audit) => audit,
            Err(e) => {
                error!("Job {} [{}] failed: {}", index, job.destination, e);
                return JobStatus::Failed(e.to_string());
            }
        };

        info!("Job {} [{}] audit session {}", index, job.destination, audit.id());

        match self.import_file(job, backend.as_mut(), &audit, progress, interrupt) {
            Ok(tables) => {
                audit.close(backend.as_mut(), &SessionStatus::Completed);
                finish(backend.as_mut(), JobStatus::Completed { tables })
            }
            Err(e) if e.is_interrupt() => {
                warn!("Job {} [{}] interrupted: {}", index, job.destination, e);
                audit.try_entry(backend.as_mut(), "Interrupted by user");
                audit.close(backend.as_mut(), &SessionStatus::Interrupted);
                finish(backend.as_mut(), JobStatus::Interrupted)
            }
            Err(e) => {
                error!("Job {} [{}] failed: {}", index, job.destination, e);
                audit.close(backend.as_mut(), &SessionStatus::Failed(e.to_string()));
                let status = JobStatus::Failed(e.to_string());
                finish(backend.as_mut(), status)
            }
        }
    }

    fn import_file(
        &self,
        job: &ImportJob,
        backend: &mut dyn Backend,
        audit: &AuditSession,
        progress: &ProgressReporter,
        interrupt: &Interrupt,
    ) -> Result<Vec<TableReport>> {
        let mut reports = Vec::new();
        if !self.options.only_post_processing {
            let source = self.opener.open(&job.source_file)?;
            audit.update_entry(backend, format!("Opened source file [{}]", job.source_file.display()))?;
            {
                let mut ctx = ImportContext {
                    source: source.as_ref(),
                    backend: &mut *backend,
                    audit,
                    progress,
                    interrupt,
                    resolver: &self.resolver,
                    mode: self.options.mode,
                };
                for kind in &self.options.tables {
                    reports.push(TableImporter::new(spec_for(*kind)).create(&mut ctx)?);
                }
            }
            backend.commit()?;
        }

        if self.options.post_process {
            audit.update_entry(backend, "Starting post-processing")?;
            for processor in &self.post_processors {
                info!("Post-processing: {}", processor.name());
                processor.process(backend, audit, interrupt)?;
            }
            backend.commit()?;
        }
        Ok(reports)
    }
}

/// Commit what the job wrote, whatever its outcome.
fn finish(backend: &mut dyn Backend, status: JobStatus) -> JobStatus {
    match backend.commit() {
        Ok(()) => status,
        Err(e) => {
            error!("Commit of [{}] failed: {}", backend.destination(), e);
            match status {
                JobStatus::Failed(reason) => JobStatus::Failed(reason),
                _ => JobStatus::Failed(ImportError::Backend(format!("commit failed: {}", e)).to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryFactory, MemoryStore};
    use crate::postprocess::TableSummary;
    use crate::source::{MemorySource, RawValue, RecordSource};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn link_only() -> RunOptions {
        RunOptions {
            tables: vec![TableKind::Links],
            ..RunOptions::default()
        }
    }

    fn opener(rows: usize) -> Arc<dyn SourceOpener> {
        Arc::new(move |_: &Path| -> Result<Box<dyn RecordSource>> {
            let records = (0..rows as i64).map(|i| vec![RawValue::Int(i)]).collect();
            Ok(Box::new(MemorySource::new().with_table("link_table", ["link_DNT"], records)))
        })
    }

    fn plan(destinations: &[&str], options: RunOptions) -> ImportPlan {
        ImportPlan {
            jobs: destinations
                .iter()
                .map(|d| ImportJob {
                    source_file: PathBuf::from(format!("/cases/{}.dit", d)),
                    destination: d.to_string(),
                })
                .collect(),
            options,
            confirmed: true,
        }
    }

    #[test]
    fn test_sequential_jobs_complete_in_order() {
        let store = MemoryStore::new();
        let orchestrator = ImportOrchestrator::new(
            plan(&["a", "b"], link_only()),
            opener(5),
            Arc::new(MemoryFactory::new(store.clone())),
        )
        .with_post_processor(Box::new(TableSummary));
        let reports = orchestrator.run(&ProgressReporter::disconnected());

        assert_eq!(reports.len(), 2);
        for (report, dest) in reports.iter().zip(["a", "b"]) {
            assert_eq!(report.job.destination, dest);
            match &report.status {
                JobStatus::Completed { tables } => assert_eq!(tables[0].records, 5),
                other => panic!("unexpected status {:?}", other),
            }
            assert_eq!(store.row_count(dest, "link_table"), Some(5));
        }
    }

    #[test]
    fn test_sequential_interrupt_stops_remaining_jobs() {
        let store = MemoryStore::new();
        let orchestrator = ImportOrchestrator::new(
            plan(&["a", "b"], link_only()),
            opener(5),
            Arc::new(MemoryFactory::new(store.clone())),
        );
        orchestrator.job_interrupt(0).unwrap().trip();
        let reports = orchestrator.run(&ProgressReporter::disconnected());

        assert_eq!(reports[0].status, JobStatus::Interrupted);
        assert_eq!(reports[1].status, JobStatus::NotStarted);
        assert_eq!(store.row_count("b", "link_table"), None);
        let log = store.table("a", "dblog").unwrap();
        assert!(log.rows.iter().any(|r| r[2].as_text() == Some("Interrupted by user")));
    }

    #[test]
    fn test_parallel_interrupt_starts_no_queued_job() {
        let store = MemoryStore::new();
        let slow: Arc<dyn SourceOpener> = Arc::new(|path: &Path| -> Result<Box<dyn RecordSource>> {
            let pause = if path.ends_with("b.dit") { 1500 } else { 300 };
            std::thread::sleep(std::time::Duration::from_millis(pause));
            let records = (0..5).map(|i| vec![RawValue::Int(i)]).collect();
            Ok(Box::new(MemorySource::new().with_table("link_table", ["link_DNT"], records)))
        });
        let options = RunOptions { workers: 2, ..link_only() };
        let orchestrator = ImportOrchestrator::new(
            plan(&["a", "b", "c"], options),
            slow,
            Arc::new(MemoryFactory::new(store.clone())),
        );
        orchestrator.job_interrupt(0).unwrap().trip();
        let reports = orchestrator.run(&ProgressReporter::disconnected());

        assert_eq!(reports[0].status, JobStatus::Interrupted);
        assert!(matches!(reports[1].status, JobStatus::Completed { .. }));
        assert_eq!(reports[2].status, JobStatus::NotStarted);
        assert_eq!(store.row_count("c", "link_table"), None);
        assert!(orchestrator.dispatch_halt().is_set());
    }

    #[test]
    fn test_failures_stay_inside_their_job() {
        struct FailingFirst {
            inner: MemoryFactory,
            calls: AtomicUsize,
        }
        impl BackendFactory for FailingFirst {
            fn connect(&self, destination: &str) -> Result<Box<dyn Backend>> {
                if destination == "broken" {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    return Err(ImportError::Backend("unreachable".to_string()));
                }
                self.inner.connect(destination)
            }
        }
        let store = MemoryStore::new();
        let factory = Arc::new(FailingFirst {
            inner: MemoryFactory::new(store.clone()),
            calls: AtomicUsize::new(0),
        });
        let options = RunOptions { workers: 2, ..link_only() };
        let orchestrator = ImportOrchestrator::new(plan(&["broken", "ok"], options), opener(3), factory.clone());
        let reports = orchestrator.run(&ProgressReporter::disconnected());

        assert!(matches!(reports[0].status, JobStatus::Failed(_)));
        assert!(matches!(reports[1].status, JobStatus::Completed { .. }));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_table_fails_job_and_audits_reason() {
        let store = MemoryStore::new();
        let options = RunOptions {
            tables: vec![TableKind::SecurityDescriptors],
            ..RunOptions::default()
        };
        let orchestrator = ImportOrchestrator::new(
            plan(&["a"], options),
            opener(1),
            Arc::new(MemoryFactory::new(store.clone())),
        );
        let reports = orchestrator.run(&ProgressReporter::disconnected());
        assert!(matches!(reports[0].status, JobStatus::Failed(_)));
        let log = store.table("a", "dblog").unwrap();
        let last = log.rows.last().and_then(|r| r[2].as_text()).unwrap();
        assert!(last.starts_with("Session failed: "));
    }

    #[test]
    fn test_only_post_processing_skips_source() {
        let store = MemoryStore::new();
        let options = RunOptions {
            only_post_processing: true,
            ..link_only()
        };
        let never: Arc<dyn SourceOpener> = Arc::new(|path: &Path| -> Result<Box<dyn RecordSource>> {
            Err(ImportError::Source(format!("{} must not be opened", path.display())))
        });
        let orchestrator = ImportOrchestrator::new(
            plan(&["a"], options),
            never,
            Arc::new(MemoryFactory::new(store.clone())),
        )
        .with_post_processor(Box::new(TableSummary));
        let reports = orchestrator.run(&ProgressReporter::disconnected());
        assert_eq!(reports[0].status, JobStatus::Completed { tables: vec![] });
        let log = store.table("a", "dblog").unwrap();
        assert!(log
            .rows
            .iter()
            .any(|r| r[2].as_text() == Some("Starting post-processing")));
    }
}
