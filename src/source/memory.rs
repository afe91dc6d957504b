//! In-memory record source

use super::{RawColumn, Record, RecordIter, RecordSource};
use crate::error::{ImportError, Result};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct MemoryTable {
    columns: Vec<RawColumn>,
    records: Vec<Record>,
}

/// Record source whose tables are built in code or loaded from an export.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, MemoryTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<S: Into<String>>(
        mut self,
        name: &str,
        columns: impl IntoIterator<Item = S>,
        records: Vec<Record>,
    ) -> Self {
        self.add_table(name, columns, records);
        self
    }

    pub fn add_table<S: Into<String>>(
        &mut self,
        name: &str,
        columns: impl IntoIterator<Item = S>,
        records: Vec<Record>,
    ) {
        let columns = columns
            .into_iter()
            .map(|c| RawColumn { name: c.into() })
            .collect();
        self.tables
            .insert(name.to_string(), MemoryTable { columns, records });
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| ImportError::Source(format!("no table named [{}]", name)))
    }
}

impl RecordSource for MemorySource {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn columns(&self, table: &str) -> Result<Vec<RawColumn>> {
        Ok(self.table(table)?.columns.clone())
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        Ok(self.table(table)?.records.len() as u64)
    }

    fn records(&self, table: &str, projection: Option<&[usize]>) -> Result<RecordIter<'_>> {
        let table = self.table(table)?;
        let width = table.columns.len();
        if let Some(positions) = projection {
            if let Some(bad) = positions.iter().find(|&&p| p >= width) {
                return Err(ImportError::Source(format!(
                    "projection position {} out of range ({} columns)",
                    bad, width
                )));
            }
        }
        let projection = projection.map(|p| p.to_vec());
        Ok(Box::new(table.records.iter().map(move |record| {
            let row = match &projection {
                Some(positions) => positions
                    .iter()
                    .map(|&p| record.get(p).cloned().unwrap_or(super::RawValue::Null))
                    .collect(),
                None => {
                    let mut row = record.clone();
                    row.resize(width, super::RawValue::Null);
                    row
                }
            };
            Ok(row)
        })))
    }
}
