//! SQLite backend
//!
//! The destination is a database file path. All writes of a connection run in
//! one transaction, opened lazily and ended by `commit()`; dropping an
//! uncommitted backend rolls back.

use super::codec::{from_sql, sql_type, to_sql};
use super::{quote_identifier, Backend, BackendFactory, TableMode};
use crate::error::{ImportError, Result};
use crate::schema::ColumnDescriptor;
use crate::source::RawValue;
use itertools::Itertools;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub struct SqliteBackend {
    destination: String,
    conn: Connection,
    /// Descriptors of the last `create_fields` call, per table
    layouts: HashMap<String, Vec<ColumnDescriptor>>,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)
            .map_err(|e| ImportError::Backend(format!("Failed to open database {}: {}", path.display(), e)))?;
        info!("Opened SQLite destination {}", path.display());
        Ok(Self {
            destination: path.display().to_string(),
            conn,
            layouts: HashMap::new(),
        })
    }

    fn begin(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn existing_fields(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn field_definition(field: &ColumnDescriptor) -> String {
    let name = quote_identifier(&field.destination_name);
    match sql_type(field.semantic_type) {
        "" => name,
        ty => format!("{} {}", name, ty),
    }
}

impl Backend for SqliteBackend {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn open_table(&mut self, table: &str, mode: TableMode) -> Result<()> {
        self.begin()?;
        self.layouts.remove(table);
        if self.table_exists(table)? {
            match mode {
                TableMode::Create => return Err(ImportError::TableExists(table.to_string())),
                TableMode::Overwrite => {
                    debug!("Dropping existing table [{}]", table);
                    self.conn
                        .execute_batch(&format!("DROP TABLE {}", quote_identifier(table)))?;
                }
                TableMode::Append => {}
            }
        }
        Ok(())
    }

    fn create_fields(&mut self, table: &str, fields: &[ColumnDescriptor]) -> Result<()> {
        if fields.is_empty() {
            return Err(ImportError::Backend(format!("no fields to declare for [{}]", table)));
        }
        self.begin()?;
        if self.table_exists(table)? {
            let existing = self.existing_fields(table)?;
            for field in fields {
                if !existing.iter().any(|e| e.eq_ignore_ascii_case(&field.destination_name)) {
                    self.conn.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        quote_identifier(table),
                        field_definition(field)
                    ))?;
                }
            }
        } else {
            self.conn.execute_batch(&format!(
                "CREATE TABLE {} ({})",
                quote_identifier(table),
                fields.iter().map(field_definition).join(", ")
            ))?;
        }
        self.layouts.insert(table.to_string(), fields.to_vec());
        Ok(())
    }

    fn create_index(&mut self, table: &str, field: &str) -> Result<()> {
        self.begin()?;
        self.conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_identifier(&format!("idx_{}_{}", table, field)),
            quote_identifier(table),
            quote_identifier(field)
        ))?;
        Ok(())
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
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            layout.iter().map(|f| quote_identifier(&f.destination_name)).join(", "),
            (1..=layout.len()).map(|i| format!("?{}", i)).join(", ")
        );
        let row = layout
            .iter()
            .zip(&values)
            .map(|(field, value)| to_sql(value, field.semantic_type));
        self.begin()?;
        self.conn.prepare_cached(&sql)?.execute(params_from_iter(row))?;
        Ok(())
    }

    fn count(&mut self, table: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn fetch_rows(&mut self, table: &str) -> Result<Vec<Vec<RawValue>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_identifier(table)))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(from_sql))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn table_names(&mut self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
            debug!("Committed {}", self.destination);
        }
        Ok(())
    }
}

/// Opens one SQLite database file per destination.
pub struct SqliteFactory;

impl BackendFactory for SqliteFactory {
    fn connect(&self, destination: &str) -> Result<Box<dyn Backend>> {
        Ok(Box::new(SqliteBackend::open(destination)?))
    }
}
