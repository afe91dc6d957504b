//! Storage Backends
//!
//! A backend owns one destination (a database file, an in-memory store) and
//! exposes table lifecycle, typed field declaration, indexing, insertion,
//! counting and commit. Backends are looked up by name in a registry.

pub mod codec;
pub mod memory;
pub mod sqlite;

pub use memory::{MemoryBackend, MemoryFactory, MemoryStore};
pub use sqlite::{SqliteBackend, SqliteFactory};

use crate::error::{ImportError, Result};
use crate::schema::ColumnDescriptor;
use crate::source::RawValue;
use itertools::Itertools;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What to do when a table being opened already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableMode {
    /// Fail with `TableExists`
    #[default]
    Create,
    /// Keep existing rows, add missing fields
    Append,
    /// Drop and recreate
    Overwrite,
}

/// One connection to one destination.
///
/// `insert_fields` takes values in the order of the descriptors last passed to
/// `create_fields` for that table.
pub trait Backend: Send {
    fn destination(&self) -> &str;

    fn open_table(&mut self, table: &str, mode: TableMode) -> Result<()>;

    /// Declare typed fields; fields the table already has are kept as they are.
    fn create_fields(&mut self, table: &str, fields: &[ColumnDescriptor]) -> Result<()>;

    fn create_index(&mut self, table: &str, field: &str) -> Result<()>;

    fn insert_fields(&mut self, table: &str, values: Vec<RawValue>) -> Result<()>;

    fn count(&mut self, table: &str) -> Result<u64>;

    /// Every row of `table`, fields in table order.
    fn fetch_rows(&mut self, table: &str) -> Result<Vec<Vec<RawValue>>>;

    fn table_names(&mut self) -> Result<Vec<String>>;

    fn commit(&mut self) -> Result<()>;
}

/// Connects to destinations of one backend kind.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, destination: &str) -> Result<Box<dyn Backend>>;
}

type FactoryBuilder = fn() -> Arc<dyn BackendFactory>;

lazy_static! {
    static ref SHARED_MEMORY: MemoryStore = MemoryStore::new();
    static ref REGISTRY: HashMap<&'static str, FactoryBuilder> = {
        let mut registry: HashMap<&'static str, FactoryBuilder> = HashMap::new();
        registry.insert("sqlite", || Arc::new(SqliteFactory));
        registry.insert("memory", || Arc::new(MemoryFactory::new(SHARED_MEMORY.clone())));
        registry
    };
}

pub fn known_backends() -> Vec<&'static str> {
    REGISTRY.keys().copied().sorted().collect()
}

/// Factory registered under `name`.
pub fn factory_for(name: &str) -> Result<Arc<dyn BackendFactory>> {
    REGISTRY
        .get(name.to_lowercase().as_str())
        .map(|build| build())
        .ok_or_else(|| ImportError::UnknownBackend {
            name: name.to_string(),
            known: known_backends().join(", "),
        })
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
