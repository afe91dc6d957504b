//! Schema Resolver - Names and types identifier-named columns
//!
//! Attribute columns of the object table are named after numeric attribute ids
//! (`ATTm131532`). Their display names and syntaxes are stored as rows of a
//! schema-description table in the same database. The resolver scans those rows
//! once and matches them against a working set of still-unresolved ids.

use super::type_mapper::syntax_to_type;
use super::types::{attribute_id_of, normalize_column_name, ColumnDescriptor, SchemaSource, TableSpec};
use crate::error::{ImportError, Result};
use crate::interrupt::Interrupt;
use crate::progress::ProgressReporter;
use crate::source::{RawValue, RecordSource};
use std::collections::HashMap;
use tracing::{debug, info};

/// One attribute definition read from the schema-description table.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaRow {
    pub identifier: Option<i64>,
    pub alt_identifier: Option<i64>,
    pub syntax_code: Option<i64>,
    pub display_name: Option<String>,
}

impl SchemaRow {
    fn from_projected(record: &[RawValue]) -> Self {
        let display_name = match record.get(3) {
            Some(RawValue::Text(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        Self {
            identifier: record.first().and_then(RawValue::as_i64),
            alt_identifier: record.get(1).and_then(RawValue::as_i64),
            syntax_code: record.get(2).and_then(RawValue::as_i64),
            display_name,
        }
    }
}

/// What a matched schema row says about a raw column.
#[derive(Clone, Debug, PartialEq)]
struct Resolution {
    display_name: String,
    syntax_code: Option<i64>,
}

pub struct SchemaResolver {
    early_exit: bool,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self { early_exit: true }
    }

    /// Scan the whole schema table even once every column is resolved.
    pub fn without_early_exit() -> Self {
        Self { early_exit: false }
    }

    /// One descriptor per raw column of `spec`'s table, in storage order.
    ///
    /// Statically known columns keep their static descriptor. Fails when the
    /// schema-description table lacks any of the four columns it needs.
    pub fn resolve(
        &self,
        spec: &TableSpec,
        schema: &SchemaSource,
        source: &dyn RecordSource,
        progress: &ProgressReporter,
        interrupt: &Interrupt,
    ) -> Result<Vec<ColumnDescriptor>> {
        info!("Resolving column names of [{}]", spec.name);
        let raw_columns = source.columns(spec.name)?;

        let mut working: HashMap<u32, String> = HashMap::new();
        for column in &raw_columns {
            if spec.static_column(&column.name).is_some() {
                continue;
            }
            if let Some(id) = attribute_id_of(&column.name) {
                working.entry(id).or_insert_with(|| column.name.clone());
            }
        }
        let to_resolve = working.len();
        info!(
            "{} columns to be identified, out of {}",
            to_resolve,
            raw_columns.len()
        );

        let projection = locate_schema_columns(schema, source)?;

        let mut resolved: HashMap<String, Resolution> = HashMap::new();
        if !working.is_empty() {
            let total = source.row_count(schema.table)?;
            let mut scan = progress.register(format!("Scanning [{}] for column names", schema.table), total);
            for record in source.records(schema.table, Some(&projection))? {
                interrupt.check("column name resolution")?;
                scan.inc();
                let row = SchemaRow::from_projected(&record?);
                if let Some((raw_name, resolution)) = match_row(&row, &mut working) {
                    debug!("{} -> {}", raw_name, resolution.display_name);
                    resolved.insert(raw_name, resolution);
                }
                if self.early_exit && working.is_empty() {
                    info!("All columns found! Ending scan early!");
                    break;
                }
            }
        }
        info!("Resolved {} / {} columns.", resolved.len(), to_resolve);

        Ok(raw_columns
            .iter()
            .map(|column| {
                if let Some(known) = spec.static_column(&column.name) {
                    return known.descriptor();
                }
                match resolved.get(&column.name) {
                    Some(resolution) => {
                        let (semantic_type, indexed) = syntax_to_type(resolution.syntax_code);
                        ColumnDescriptor::new(
                            normalize_column_name(&resolution.display_name),
                            column.name.clone(),
                            semantic_type,
                            indexed,
                        )
                    }
                    None => ColumnDescriptor::unknown(&column.name),
                }
            })
            .collect())
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Positions of (attribute id, alternate id, syntax, display name) in the
/// schema-description table.
fn locate_schema_columns(schema: &SchemaSource, source: &dyn RecordSource) -> Result<Vec<usize>> {
    let columns = source.columns(schema.table)?;
    let find = |wanted: u32| {
        columns
            .iter()
            .position(|c| attribute_id_of(&c.name) == Some(wanted))
    };

    let required = [
        ("attribute id", schema.attribute_id),
        ("alternate id", schema.alt_identifier),
        ("attribute syntax", schema.attribute_syntax),
        ("display name", schema.display_name),
    ];
    let mut positions = Vec::with_capacity(required.len());
    let mut missing = Vec::new();
    for (label, id) in required {
        match find(id) {
            Some(position) => positions.push(position),
            None => missing.push(format!("{} ({})", label, id)),
        }
    }
    if !missing.is_empty() {
        return Err(ImportError::SchemaResolution(format!(
            "missing {} column(s) in [{}]: {}",
            missing.len(),
            schema.table,
            missing.join(", ")
        )));
    }
    Ok(positions)
}

/// Remove the row's attribute id, or failing that its alternate id, from the
/// working set. The first row to claim an id wins.
fn match_row(row: &SchemaRow, working: &mut HashMap<u32, String>) -> Option<(String, Resolution)> {
    let display_name = row.display_name.as_ref()?;
    if row.identifier.is_none() && row.alt_identifier.is_none() {
        return None;
    }
    let mut take = |id: Option<i64>| {
        id.and_then(|id| u32::try_from(id).ok())
            .and_then(|id| working.remove(&id))
    };
    let raw_name = take(row.identifier).or_else(|| take(row.alt_identifier))?;
    Some((
        raw_name,
        Resolution {
            display_name: display_name.clone(),
            syntax_code: row.syntax_code,
        },
    ))
}
