//! Record Source - Abstract interface over a directory database export
//!
//! The binary page/B-tree parser lives outside this crate. Anything that can
//! enumerate a table's columns and iterate its records plugs in here.

pub mod json_export;
pub mod memory;

pub use json_export::{JsonExportOpener, JsonExportSource};
pub use memory::MemorySource;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One raw cell value as produced by the parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    /// Multi-valued attribute
    Multi(Vec<RawValue>),
}

impl RawValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(i) => Some(*i),
            RawValue::Bool(b) => Some(*b as i64),
            RawValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(v: Vec<u8>) -> Self {
        RawValue::Binary(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Null)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
}

pub type Record = Vec<RawValue>;

pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// Read access to the tables of one opened database file.
pub trait RecordSource: Send {
    fn has_table(&self, table: &str) -> bool;

    /// Columns of `table`, in storage order.
    fn columns(&self, table: &str) -> Result<Vec<RawColumn>>;

    fn row_count(&self, table: &str) -> Result<u64>;

    /// Fresh forward iterator over the records of `table`.
    ///
    /// With a projection, each record holds only the listed column positions,
    /// in projection order. Every call restarts from the first record.
    fn records(&self, table: &str, projection: Option<&[usize]>) -> Result<RecordIter<'_>>;
}

/// Opens a record source for a job's source file, inside the worker that runs it.
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn RecordSource>>;
}

impl<F> SourceOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn RecordSource>> + Send + Sync,
{
    fn open(&self, path: &Path) -> Result<Box<dyn RecordSource>> {
        self(path)
    }
}
