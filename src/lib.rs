pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod importer;
pub mod interrupt;
pub mod orchestrator;
pub mod postprocess;
pub mod progress;
pub mod rpn_edit;
pub mod schema;
pub mod source;

pub use audit::{AuditSession, SessionStatus};
pub use backend::{factory_for, Backend, BackendFactory, TableMode};
pub use config::{FilenamePattern, ImportConfig, ImportPlan};
pub use error::{ImportError, Result};
pub use importer::{ImportContext, TableImporter, TableReport};
pub use interrupt::Interrupt;
pub use orchestrator::{ImportJob, ImportOrchestrator, JobReport, JobStatus, RunOptions};
pub use postprocess::{PostProcessor, TableSummary};
pub use progress::{ProgressDisplay, ProgressHub, ProgressReporter};
pub use schema::{ColumnCatalog, ColumnDescriptor, SchemaResolver, SemanticType, TableKind, TableSpec};
pub use source::{RawValue, RecordSource, SourceOpener};
