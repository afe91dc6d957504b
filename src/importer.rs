//! Table Importer - Generic engine turning one source table into a typed
//! destination table plus its `<table>_meta` sibling.

use crate::audit::AuditSession;
use crate::backend::{Backend, TableMode};
use crate::error::{ImportError, Result};
use crate::interrupt::Interrupt;
use crate::progress::ProgressReporter;
use crate::schema::{meta_descriptors, ColumnCatalog, SchemaResolver, TableSpec};
use crate::source::{RawValue, RecordSource};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything one job lends to the importers of its tables.
pub struct ImportContext<'a> {
    pub source: &'a dyn RecordSource,
    pub backend: &'a mut dyn Backend,
    pub audit: &'a AuditSession,
    pub progress: &'a ProgressReporter,
    pub interrupt: &'a Interrupt,
    pub resolver: &'a SchemaResolver,
    pub mode: TableMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub columns: usize,
    pub records: u64,
}

pub struct TableImporter<'s> {
    spec: &'s TableSpec,
}

impl<'s> TableImporter<'s> {
    pub fn new(spec: &'s TableSpec) -> Self {
        Self { spec }
    }

    /// Import the whole table.
    ///
    /// An interrupt stops the record stream between two records and is returned
    /// as `ImportError::Interrupted`; rows already inserted stay in place and no
    /// metatable is written.
    pub fn create(&self, ctx: &mut ImportContext<'_>) -> Result<TableReport> {
        let table = self.spec.name;
        let metatable = self.spec.metatable_name();
        ctx.audit
            .update_entry(ctx.backend, format!("Start of importation of [{}]", table))?;
        if !ctx.source.has_table(table) {
            return Err(ImportError::Source(format!("source file has no table [{}]", table)));
        }

        let catalog = ColumnCatalog::resolve(self.spec, ctx.source, ctx.resolver, ctx.progress, ctx.interrupt)?;

        ctx.backend.open_table(&metatable, ctx.mode)?;
        ctx.backend.create_fields(&metatable, &meta_descriptors())?;
        ctx.backend.open_table(table, ctx.mode)?;
        ctx.backend.create_fields(table, catalog.columns())?;

        for column in catalog.columns().iter().filter(|c| c.indexed) {
            ctx.backend.create_index(table, &column.destination_name)?;
        }
        for index in self.spec.indexes {
            if catalog.contains_destination(index) {
                ctx.backend.create_index(table, index)?;
            } else {
                warn!("Index [{}] skipped, [{}] has no such column", index, table);
            }
        }

        self.stream(ctx, catalog.len())?;

        let records = ctx.backend.count(table)?;
        ctx.audit.update_entry(
            ctx.backend,
            format!("End of importation of [{}]. {} records.", table, records),
        )?;

        ctx.audit
            .update_entry(ctx.backend, format!("Start of creation of metatable for [{}]", table))?;
        for row in catalog.to_metatable_rows() {
            ctx.backend.insert_fields(&metatable, row)?;
        }
        ctx.audit
            .update_entry(ctx.backend, format!("End of creation of metatable for [{}]", table))?;

        Ok(TableReport {
            table: table.to_string(),
            columns: catalog.len(),
            records,
        })
    }

    fn stream(&self, ctx: &mut ImportContext<'_>, width: usize) -> Result<()> {
        let table = self.spec.name;
        let total = ctx.source.row_count(table)?;
        info!("Importing {} records of [{}]", total, table);
        let mut progress = ctx.progress.register(table, total);

        for record in ctx.source.records(table, None)? {
            ctx.interrupt.check(&format!("import of [{}]", table))?;
            let mut record = record?;
            if record.len() > width {
                return Err(ImportError::Source(format!(
                    "record of [{}] has {} values for {} columns",
                    table,
                    record.len(),
                    width
                )));
            }
            record.resize(width, RawValue::Null);
            ctx.backend.insert_fields(table, record)?;
            progress.inc();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MemoryStore};
    use crate::schema::{ColumnCatalog, LINK_TABLE, SD_TABLE};
    use crate::source::{MemorySource, RawValue};

    fn link_source(rows: usize) -> MemorySource {
        let records = (0..rows as i64)
            .map(|i| vec![RawValue::Int(i), RawValue::Int(i + 1), RawValue::Int(2), RawValue::Null])
            .collect();
        MemorySource::new().with_table(
            "link_table",
            ["link_DNT", "backlink_DNT", "link_base", "link_data"],
            records,
        )
    }

    fn run(
        spec: &TableSpec,
        source: &MemorySource,
        backend: &mut MemoryBackend,
        interrupt: &Interrupt,
        mode: TableMode,
    ) -> Result<TableReport> {
        let audit = AuditSession::open(backend)?;
        let progress = ProgressReporter::disconnected();
        let resolver = SchemaResolver::new();
        let mut ctx = ImportContext {
            source,
            backend,
            audit: &audit,
            progress: &progress,
            interrupt,
            resolver: &resolver,
            mode,
        };
        TableImporter::new(spec).create(&mut ctx)
    }

    #[test]
    fn test_imports_rows_and_metatable() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        let report = run(&LINK_TABLE, &link_source(250), &mut backend, &Interrupt::new(), TableMode::Create).unwrap();
        assert_eq!(report.records, 250);
        assert_eq!(report.columns, 4);

        let table = store.table("dest", "link_table").unwrap();
        assert!(table.indexes.contains(&"link_DNT".to_string()));
        assert!(table.rows.iter().all(|r| r.len() == 4));

        let meta = store.table("dest", "link_table_meta").unwrap();
        let catalog = ColumnCatalog::from_metatable_rows(&meta.rows).unwrap();
        assert_eq!(catalog.columns(), table.fields.as_slice());

        let log = store.table("dest", "dblog").unwrap();
        let messages: Vec<_> = log.rows.iter().filter_map(|r| r[2].as_text()).collect();
        assert!(messages.contains(&"End of importation of [link_table]. 250 records."));
        assert_eq!(messages.last(), Some(&"End of creation of metatable for [link_table]"));
    }

    #[test]
    fn test_interrupt_keeps_inserted_rows_and_skips_metatable() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        let interrupt = Interrupt::new();
        interrupt.trip();
        let err = run(&LINK_TABLE, &link_source(10), &mut backend, &interrupt, TableMode::Create).unwrap_err();
        assert!(err.is_interrupt());
        assert_eq!(store.row_count("dest", "link_table"), Some(0));
        assert_eq!(store.row_count("dest", "link_table_meta"), Some(0));
    }

    #[test]
    fn test_short_records_are_padded_and_wide_records_rejected() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        let short = MemorySource::new().with_table("sd_table", ["sd_id", "sd_value"], vec![vec![RawValue::Int(1)]]);
        run(&SD_TABLE, &short, &mut backend, &Interrupt::new(), TableMode::Create).unwrap();
        let rows = &store.table("dest", "sd_table").unwrap().rows;
        assert_eq!(rows[0], vec![RawValue::Int(1), RawValue::Null]);

        let wide = MemorySource::new().with_table(
            "sd_table",
            ["sd_id"],
            vec![vec![RawValue::Int(1), RawValue::Int(2)]],
        );
        let err = run(&SD_TABLE, &wide, &mut backend, &Interrupt::new(), TableMode::Overwrite).unwrap_err();
        assert!(matches!(err, ImportError::Source(_)));
    }

    #[test]
    fn test_existing_table_requires_append_or_overwrite() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        let source = MemorySource::new().with_table("sd_table", ["sd_id", "sd_value"], vec![vec![RawValue::Int(1)]]);
        run(&SD_TABLE, &source, &mut backend, &Interrupt::new(), TableMode::Create).unwrap();
        assert!(run(&SD_TABLE, &source, &mut backend, &Interrupt::new(), TableMode::Create).is_err());

        run(&SD_TABLE, &source, &mut backend, &Interrupt::new(), TableMode::Append).unwrap();
        assert_eq!(store.row_count("dest", "sd_table"), Some(2));
        assert_eq!(store.row_count("dest", "sd_table_meta"), Some(4));

        let report = run(&SD_TABLE, &source, &mut backend, &Interrupt::new(), TableMode::Overwrite).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(store.row_count("dest", "sd_table_meta"), Some(2));
    }
}
