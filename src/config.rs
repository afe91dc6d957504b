//! Run configuration
//!
//! `ImportConfig` carries the options of one run as given on the command line.
//! `plan()` validates all of them and derives the job list before anything is
//! opened; a configuration error therefore never leaves partial state behind.

use crate::backend::TableMode;
use crate::error::{ImportError, Result};
use crate::orchestrator::{ImportJob, RunOptions};
use crate::rpn_edit::derive_destination;
use crate::schema::TableKind;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_BACKEND: &str = "sqlite";

/// Destination derived from each filename: `format` with `%s` replaced by the
/// result of `program` (see `rpn_edit`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenamePattern {
    pub format: String,
    pub program: String,
}

/// The three mutually exclusive ways of naming destinations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestinationSpec<'a> {
    Explicit(&'a [String]),
    List(&'a str),
    FromFilename(&'a FilenamePattern),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub files: Vec<PathBuf>,
    /// One destination per file
    pub destinations: Vec<String>,
    /// Comma-separated destinations in file order
    pub destination_list: Option<String>,
    pub destination_pattern: Option<FilenamePattern>,
    pub backend: String,
    /// Table filter, empty for all
    pub only: String,
    pub append: bool,
    pub overwrite: bool,
    pub no_post_processing: bool,
    pub only_post_processing: bool,
    pub multi: bool,
    pub proc_num: Option<usize>,
    /// Skip the confirmation prompt
    pub yes: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            destinations: Vec::new(),
            destination_list: None,
            destination_pattern: None,
            backend: DEFAULT_BACKEND.to_string(),
            only: String::new(),
            append: false,
            overwrite: false,
            no_post_processing: false,
            only_post_processing: false,
            multi: false,
            proc_num: None,
            yes: false,
        }
    }
}

/// Validated jobs and options of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportPlan {
    pub jobs: Vec<ImportJob>,
    pub options: RunOptions,
    /// Confirmation already given
    pub confirmed: bool,
}

impl ImportPlan {
    /// True when several distinct destinations are about to be written and
    /// nobody said yes yet.
    pub fn needs_confirmation(&self) -> bool {
        !self.confirmed && self.jobs.iter().map(|j| &j.destination).unique().count() > 1
    }
}

impl ImportConfig {
    pub fn destination_spec(&self) -> Result<DestinationSpec<'_>> {
        let mut given = Vec::new();
        if !self.destinations.is_empty() {
            given.push(DestinationSpec::Explicit(&self.destinations));
        }
        if let Some(list) = &self.destination_list {
            given.push(DestinationSpec::List(list));
        }
        if let Some(pattern) = &self.destination_pattern {
            given.push(DestinationSpec::FromFilename(pattern));
        }
        match given.len() {
            0 => Err(ImportError::Config(
                "no destination given (use -C, --C-list or --C-from-filename)".to_string(),
            )),
            1 => Ok(given.remove(0)),
            _ => Err(ImportError::Config(
                "-C, --C-list and --C-from-filename are mutually exclusive".to_string(),
            )),
        }
    }

    /// One destination per file, in file order.
    pub fn destination_names(&self) -> Result<Vec<String>> {
        let names = match self.destination_spec()? {
            DestinationSpec::Explicit(names) => names.to_vec(),
            DestinationSpec::List(list) => list.split(',').map(str::to_string).collect(),
            DestinationSpec::FromFilename(pattern) => self
                .files
                .iter()
                .map(|f| derive_destination(&pattern.format, &pattern.program, &f.to_string_lossy()))
                .collect::<Result<Vec<_>>>()?,
        };
        if names.len() != self.files.len() {
            return Err(ImportError::Config(format!(
                "{} source file(s) but {} destination(s)",
                self.files.len(),
                names.len()
            )));
        }
        Ok(names)
    }

    pub fn table_mode(&self) -> Result<TableMode> {
        match (self.append, self.overwrite) {
            (true, true) => Err(ImportError::Config(
                "--append and --overwrite are mutually exclusive".to_string(),
            )),
            (true, false) => Ok(TableMode::Append),
            (false, true) => Ok(TableMode::Overwrite),
            (false, false) => Ok(TableMode::Create),
        }
    }

    pub fn tables(&self) -> Result<Vec<TableKind>> {
        if self.only.trim().is_empty() {
            return Ok(TableKind::ORDERED.to_vec());
        }
        TableKind::parse(&self.only)
            .map(|kind| vec![kind])
            .ok_or_else(|| {
                ImportError::Config(format!(
                    "unknown table '{}' (expected sdtable, linktable or datatable)",
                    self.only
                ))
            })
    }

    pub fn workers(&self) -> Result<usize> {
        if !self.multi {
            if self.proc_num.is_some() {
                warn!("--proc-num has no effect without --multi");
            }
            return Ok(1);
        }
        match self.proc_num {
            Some(0) => Err(ImportError::Config("--proc-num must be at least 1".to_string())),
            Some(n) => Ok(n),
            None => Ok(num_cpus::get().max(1)),
        }
    }

    /// Validate everything and build the job list.
    pub fn plan(&self) -> Result<ImportPlan> {
        if self.files.is_empty() {
            return Err(ImportError::Config("no source file given".to_string()));
        }
        if self.no_post_processing && self.only_post_processing {
            return Err(ImportError::Config(
                "--no-post-processing and --only-post-processing leave nothing to do".to_string(),
            ));
        }
        let destinations = self.destination_names()?;
        let options = RunOptions {
            tables: self.tables()?,
            mode: self.table_mode()?,
            post_process: !self.no_post_processing,
            only_post_processing: self.only_post_processing,
            workers: self.workers()?,
        };

        let duplicates: Vec<_> = destinations.iter().duplicates().collect();
        if !duplicates.is_empty() {
            warn!("Destination(s) used more than once: {}", duplicates.iter().join(", "));
        }

        let jobs: Vec<ImportJob> = self
            .files
            .iter()
            .cloned()
            .zip(destinations)
            .map(|(source_file, destination)| ImportJob { source_file, destination })
            .collect();
        for job in &jobs {
            info!("Going to import {:<15} <- {}", job.destination, job.source_file.display());
        }
        Ok(ImportPlan {
            jobs,
            options,
            confirmed: self.yes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(files: &[&str]) -> ImportConfig {
        ImportConfig {
            files: files.iter().map(PathBuf::from).collect(),
            ..ImportConfig::default()
        }
    }

    #[test]
    fn test_explicit_destinations() {
        let cfg = ImportConfig {
            destinations: vec!["a.db".to_string(), "b.db".to_string()],
            ..config(&["a.dit", "b.dit"])
        };
        let plan = cfg.plan().unwrap();
        assert_eq!(plan.jobs[1].destination, "b.db");
        assert_eq!(plan.options, RunOptions::default());
        assert!(plan.needs_confirmation());
    }

    #[test]
    fn test_count_mismatch_is_rejected_in_every_mode() {
        let explicit = ImportConfig {
            destinations: vec!["a.db".to_string()],
            ..config(&["a.dit", "b.dit"])
        };
        let list = ImportConfig {
            destination_list: Some("a.db,b.db,c.db".to_string()),
            ..config(&["a.dit", "b.dit"])
        };
        for cfg in [explicit, list] {
            assert!(matches!(cfg.plan(), Err(ImportError::Config(_))));
        }
    }

    #[test]
    fn test_modes_are_exclusive() {
        let cfg = ImportConfig {
            destinations: vec!["a.db".to_string()],
            destination_list: Some("a.db".to_string()),
            ..config(&["a.dit"])
        };
        assert!(cfg.plan().is_err());
        assert!(config(&["a.dit"]).plan().is_err());
    }

    #[test]
    fn test_destinations_from_filenames() {
        let cfg = ImportConfig {
            destination_pattern: Some(FilenamePattern {
                format: "/out/%s.sqlite".to_string(),
                program: "basename rmext lower".to_string(),
            }),
            yes: true,
            ..config(&["/cases/DC01.dit", "/cases/DC02.dit"])
        };
        let plan = cfg.plan().unwrap();
        let names: Vec<_> = plan.jobs.iter().map(|j| j.destination.as_str()).collect();
        assert_eq!(names, ["/out/dc01.sqlite", "/out/dc02.sqlite"]);
        assert!(!plan.needs_confirmation());
    }

    #[test]
    fn test_options() {
        let cfg = ImportConfig {
            destination_list: Some("a.db".to_string()),
            only: "LinkTable".to_string(),
            overwrite: true,
            no_post_processing: true,
            multi: true,
            proc_num: Some(3),
            ..config(&["a.dit"])
        };
        let plan = cfg.plan().unwrap();
        assert_eq!(plan.options.tables, vec![TableKind::Links]);
        assert_eq!(plan.options.mode, TableMode::Overwrite);
        assert!(!plan.options.post_process);
        assert_eq!(plan.options.workers, 3);
        assert!(!plan.needs_confirmation());
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let base = ImportConfig {
            destination_list: Some("a.db".to_string()),
            ..config(&["a.dit"])
        };
        let cases = [
            ImportConfig { only: "objects".to_string(), ..base.clone() },
            ImportConfig { append: true, overwrite: true, ..base.clone() },
            ImportConfig { multi: true, proc_num: Some(0), ..base.clone() },
            ImportConfig { no_post_processing: true, only_post_processing: true, ..base.clone() },
        ];
        for cfg in cases {
            assert!(matches!(cfg.plan(), Err(ImportError::Config(_))), "{:?}", cfg);
        }
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let cfg: ImportConfig =
            serde_json::from_str(r#"{"files": ["a.dit"], "destinations": ["a.db"], "multi": true}"#).unwrap();
        assert_eq!(cfg.backend, DEFAULT_BACKEND);
        assert!(cfg.workers().unwrap() >= 1);
    }
}
