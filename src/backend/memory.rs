//! In-process backend. Destinations live in a shared `MemoryStore` so that a
//! caller can inspect what a job wrote after its connection is gone.

use super::{Backend, BackendFactory, TableMode};
use crate::error::{ImportError, Result};
use crate::schema::ColumnDescriptor;
use crate::source::RawValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    pub fields: Vec<ColumnDescriptor>,
    pub indexes: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

type Tables = BTreeMap<String, MemoryTable>;

/// Every destination written through memory backends sharing this store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Tables>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Tables>>> {
        self.inner
            .lock()
            .map_err(|_| ImportError::Backend("memory store lock poisoned".to_string()))
    }

    /// Copy of one table of one destination.
    pub fn table(&self, destination: &str, table: &str) -> Option<MemoryTable> {
        self.lock()
            .ok()?
            .get(destination)
            .and_then(|tables| tables.get(table))
            .cloned()
    }

    pub fn row_count(&self, destination: &str, table: &str) -> Option<usize> {
        self.table(destination, table).map(|t| t.rows.len())
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

pub struct MemoryBackend {
    store: MemoryStore,
    destination: String,
    /// Field positions of the last `create_fields` layout, per table
    layouts: HashMap<String, Vec<usize>>,
    commits: usize,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore, destination: impl Into<String>) -> Self {
        Self {
            store,
            destination: destination.into(),
            layouts: HashMap::new(),
            commits: 0,
        }
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut store = self.store.lock()?;
        f(store.entry(self.destination.clone()).or_default())
    }
}

fn missing(table: &str) -> ImportError {
    ImportError::Backend(format!("table [{}] does not exist", table))
}

impl Backend for MemoryBackend {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn open_table(&mut self, table: &str, mode: TableMode) -> Result<()> {
        self.layouts.remove(table);
        self.with_tables(|tables| {
            match (mode, tables.contains_key(table)) {
                (TableMode::Create, true) => return Err(ImportError::TableExists(table.to_string())),
                (TableMode::Overwrite, true) => {
                    tables.remove(table);
                }
                _ => {}
            }
            tables.entry(table.to_string()).or_default();
            Ok(())
        })
    }

    fn create_fields(&mut self, table: &str, fields: &[ColumnDescriptor]) -> Result<()> {
        let layout = self.with_tables(|tables| {
            let entry = tables.get_mut(table).ok_or_else(|| missing(table))?;
            let mut layout = Vec::with_capacity(fields.len());
            for field in fields {
                let position = entry
                    .fields
                    .iter()
                    .position(|f| f.destination_name.eq_ignore_ascii_case(&field.destination_name));
                match position {
                    Some(position) => layout.push(position),
                    None => {
                        entry.fields.push(field.clone());
                        for row in &mut entry.rows {
                            row.push(RawValue::Null);
                        }
                        layout.push(entry.fields.len() - 1);
                    }
                }
            }
            Ok(layout)
        })?;
        self.layouts.insert(table.to_string(), layout);
        Ok(())
    }

    fn create_index(&mut self, table: &str, field: &str) -> Result<()> {
        self.with_tables(|tables| {
            let entry = tables.get_mut(table).ok_or_else(|| missing(table))?;
            if !entry.fields.iter().any(|f| f.destination_name == field) {
                return Err(ImportError::Backend(format!(
                    "cannot index unknown field [{}] of [{}]",
                    field, table
                )));
            }
            if !entry.indexes.iter().any(|i| i == field) {
                entry.indexes.push(field.to_string());
            }
            Ok(())
        })
    }

    fn insert_fields(&mut self, table: &str, values: Vec<RawValue>) -> Result<()> {
        let layout = self
            .layouts
            .get(table)
            .ok_or_else(|| ImportError::Backend(format!("no fields declared for [{}]", table)))?;
        if values.len() != layout.len() {
            return Err(ImportError::Backend(format!(
                "[{}] expects {} values, got {}",
                table,
                layout.len(),
                values.len()
            )));
        }
        self.with_tables(|tables| {
            let entry = tables.get_mut(table).ok_or_else(|| missing(table))?;
            let mut row = vec![RawValue::Null; entry.fields.len()];
            for (position, value) in layout.iter().zip(values) {
                row[*position] = value;
            }
            entry.rows.push(row);
            Ok(())
        })
    }

    fn count(&mut self, table: &str) -> Result<u64> {
        self.with_tables(|tables| {
            tables
                .get(table)
                .map(|t| t.rows.len() as u64)
                .ok_or_else(|| missing(table))
        })
    }

    fn fetch_rows(&mut self, table: &str) -> Result<Vec<Vec<RawValue>>> {
        self.with_tables(|tables| {
            tables
                .get(table)
                .map(|t| t.rows.clone())
                .ok_or_else(|| missing(table))
        })
    }

    fn table_names(&mut self) -> Result<Vec<String>> {
        self.with_tables(|tables| Ok(tables.keys().cloned().collect()))
    }

    fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}

/// Connects memory backends to one shared store.
pub struct MemoryFactory {
    store: MemoryStore,
}

impl MemoryFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl BackendFactory for MemoryFactory {
    fn connect(&self, destination: &str) -> Result<Box<dyn Backend>> {
        Ok(Box::new(MemoryBackend::new(self.store.clone(), destination)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SemanticType;

    fn fields(names: &[&str]) -> Vec<ColumnDescriptor> {
        names
            .iter()
            .map(|n| ColumnDescriptor::new(*n, *n, SemanticType::Text, false))
            .collect()
    }

    #[test]
    fn test_create_mode_refuses_existing_table() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        backend.open_table("sd_table", TableMode::Create).unwrap();
        let err = backend.open_table("sd_table", TableMode::Create).unwrap_err();
        assert!(matches!(err, ImportError::TableExists(_)));
        backend.open_table("sd_table", TableMode::Append).unwrap();
    }

    #[test]
    fn test_append_maps_values_onto_existing_fields() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        backend.open_table("t", TableMode::Create).unwrap();
        backend.create_fields("t", &fields(&["a", "b"])).unwrap();
        backend.insert_fields("t", vec!["a1".into(), "b1".into()]).unwrap();

        backend.open_table("t", TableMode::Append).unwrap();
        backend.create_fields("t", &fields(&["c", "a"])).unwrap();
        backend.insert_fields("t", vec!["c2".into(), "a2".into()]).unwrap();

        let table = store.table("dest", "t").unwrap();
        assert_eq!(table.fields.len(), 3);
        assert_eq!(table.rows[0], vec!["a1".into(), "b1".into(), RawValue::Null]);
        assert_eq!(table.rows[1], vec!["a2".into(), RawValue::Null, "c2".into()]);
    }

    #[test]
    fn test_overwrite_drops_rows_and_width_is_enforced() {
        let store = MemoryStore::new();
        let mut backend = MemoryBackend::new(store.clone(), "dest");
        backend.open_table("t", TableMode::Create).unwrap();
        backend.create_fields("t", &fields(&["a"])).unwrap();
        backend.insert_fields("t", vec!["x".into()]).unwrap();
        assert!(backend.insert_fields("t", vec![]).is_err());

        backend.open_table("t", TableMode::Overwrite).unwrap();
        assert_eq!(backend.count("t").unwrap(), 0);
        assert!(backend.insert_fields("t", vec!["x".into()]).is_err());
        assert!(backend.create_index("t", "a").is_err());
    }
}
