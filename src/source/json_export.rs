//! JSON Export Source - Reads a database dump produced by an external parser
//!
//! Layout:
//! `{"tables": {"<name>": {"columns": ["..."], "records": [[...], ...]}}}`
//!
//! Cells: `null`, booleans, integers, floats and strings map directly,
//! `{"$binary": "<hex>"}` is a binary value and arrays are multi-valued cells.

use super::{MemorySource, RawColumn, RawValue, RecordIter, RecordSource, SourceOpener};
use crate::error::{ImportError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

#[derive(Deserialize)]
struct ExportDocument {
    tables: BTreeMap<String, ExportTable>,
}

#[derive(Deserialize)]
struct ExportTable {
    columns: Vec<String>,
    #[serde(default)]
    records: Vec<Vec<Value>>,
}

pub struct JsonExportSource {
    inner: MemorySource,
}

impl JsonExportSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ImportError::Source(format!("cannot open {}: {}", path.display(), e)))?;
        let document: ExportDocument = serde_json::from_reader(BufReader::new(file))?;
        Self::from_document(path, document)
    }

    pub fn from_json(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let document: ExportDocument = serde_json::from_str(content)?;
        Self::from_document(path.as_ref(), document)
    }

    fn from_document(path: &Path, document: ExportDocument) -> Result<Self> {
        let mut inner = MemorySource::new();
        for (name, table) in document.tables {
            let records = table
                .records
                .into_iter()
                .map(|row| row.into_iter().map(convert_cell).collect::<Result<Vec<_>>>())
                .collect::<Result<Vec<_>>>()
                .map_err(|e| ImportError::Source(format!("{}: table [{}]: {}", path.display(), name, e)))?;
            info!("Loaded [{}] from export: {} records", name, records.len());
            inner.add_table(&name, table.columns, records);
        }
        Ok(Self { inner })
    }
}

fn convert_cell(value: Value) -> Result<RawValue> {
    Ok(match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Int(i),
            None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => RawValue::Text(s),
        Value::Array(items) => {
            RawValue::Multi(items.into_iter().map(convert_cell).collect::<Result<_>>()?)
        }
        Value::Object(map) => match map.get("$binary").and_then(Value::as_str) {
            Some(encoded) => RawValue::Binary(
                hex::decode(encoded)
                    .map_err(|e| ImportError::Source(format!("bad $binary cell: {}", e)))?,
            ),
            None => {
                return Err(ImportError::Source(
                    "object cells must be of the form {\"$binary\": \"<hex>\"}".to_string(),
                ))
            }
        },
    })
}

impl RecordSource for JsonExportSource {
    fn has_table(&self, table: &str) -> bool {
        self.inner.has_table(table)
    }

    fn columns(&self, table: &str) -> Result<Vec<RawColumn>> {
        self.inner.columns(table)
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        self.inner.row_count(table)
    }

    fn records(&self, table: &str, projection: Option<&[usize]>) -> Result<RecordIter<'_>> {
        self.inner.records(table, projection)
    }
}

/// Opens source files as JSON exports.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonExportOpener;

impl SourceOpener for JsonExportOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RecordSource>> {
        Ok(Box::new(JsonExportSource::open(path)?))
    }
}
