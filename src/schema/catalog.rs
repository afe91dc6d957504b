//! Column Catalog - The ordered, resolved column list of one destination table
//!
//! Also owns the metatable encoding: one row per descriptor, persisted next to
//! the data table so downstream tools can recover the catalog.

use super::resolver::SchemaResolver;
use super::types::{normalize_column_name, ColumnDescriptor, SemanticType, StaticColumn, TableSpec};
use crate::error::{ImportError, Result};
use crate::interrupt::Interrupt;
use crate::progress::ProgressReporter;
use crate::source::{RawValue, RecordSource};
use std::collections::HashSet;
use tracing::warn;

/// Fields of every `<table>_meta` table.
pub static META_COLUMNS: [StaticColumn; 4] = [
    StaticColumn::new("name", "name", SemanticType::Text, false),
    StaticColumn::new("attname", "attname", SemanticType::Text, true),
    StaticColumn::new("type", "type", SemanticType::Text, false),
    StaticColumn::new("index", "index", SemanticType::Int, false),
];

pub fn meta_descriptors() -> Vec<ColumnDescriptor> {
    META_COLUMNS.iter().map(StaticColumn::descriptor).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnCatalog {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnCatalog {
    /// Validate and freeze a descriptor list.
    ///
    /// Source identifiers must be unique. A destination name already taken by an
    /// earlier column gets the normalized source identifier appended.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        let mut sources = HashSet::new();
        let mut destinations = HashSet::new();
        let mut out = Vec::with_capacity(columns.len());
        for mut column in columns {
            if !sources.insert(column.source_identifier.clone()) {
                return Err(ImportError::SchemaResolution(format!(
                    "column [{}] appears twice",
                    column.source_identifier
                )));
            }
            if !destinations.insert(column.destination_name.to_lowercase()) {
                let suffix = normalize_column_name(&column.source_identifier);
                let mut renamed = format!("{}_{}", column.destination_name, suffix);
                while !destinations.insert(renamed.to_lowercase()) {
                    renamed = format!("{}_{}", renamed, suffix);
                }
                warn!(
                    "Column name [{}] is already used, storing [{}] as [{}]",
                    column.destination_name, column.source_identifier, renamed
                );
                column.destination_name = renamed;
            }
            out.push(column);
        }
        Ok(Self { columns: out })
    }

    /// Catalog of `spec`'s table as present in `source`.
    ///
    /// Static tables merge their known definitions with raw-named fallbacks;
    /// schema-driven tables delegate to the resolver.
    pub fn resolve(
        spec: &TableSpec,
        source: &dyn RecordSource,
        resolver: &SchemaResolver,
        progress: &ProgressReporter,
        interrupt: &Interrupt,
    ) -> Result<Self> {
        let columns = match &spec.schema {
            Some(schema) => resolver.resolve(spec, schema, source, progress, interrupt)?,
            None => source
                .columns(spec.name)?
                .iter()
                .map(|column| match spec.static_column(&column.name) {
                    Some(known) => known.descriptor(),
                    None => ColumnDescriptor::unknown(&column.name),
                })
                .collect(),
        };
        Self::new(columns)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains_destination(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.destination_name == name)
    }

    /// Metatable rows, in catalog order, laid out as `META_COLUMNS`.
    pub fn to_metatable_rows(&self) -> Vec<Vec<RawValue>> {
        self.columns
            .iter()
            .map(|c| {
                vec![
                    RawValue::Text(c.destination_name.clone()),
                    RawValue::Text(c.source_identifier.clone()),
                    RawValue::Text(c.semantic_type.as_str().to_string()),
                    RawValue::Bool(c.indexed),
                ]
            })
            .collect()
    }

    /// Rebuild a catalog from rows laid out as `META_COLUMNS`.
    pub fn from_metatable_rows(rows: &[Vec<RawValue>]) -> Result<Self> {
        let text = |row: &[RawValue], i: usize| -> Result<String> {
            row.get(i)
                .and_then(RawValue::as_text)
                .map(str::to_string)
                .ok_or_else(|| {
                    ImportError::Backend(format!("metatable field [{}] is not text", META_COLUMNS[i].name))
                })
        };
        let columns = rows
            .iter()
            .map(|row| {
                let semantic_type = text(row, 2)?
                    .parse::<SemanticType>()
                    .map_err(ImportError::Backend)?;
                let indexed = row.get(3).and_then(RawValue::as_i64).unwrap_or(0) != 0;
                Ok(ColumnDescriptor::new(text(row, 0)?, text(row, 1)?, semantic_type, indexed))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{DATATABLE, LINK_TABLE};
    use crate::source::MemorySource;

    #[test]
    fn test_static_merge_keeps_order_and_unknowns() {
        let source = MemorySource::new().with_table(
            "link_table",
            ["link_DNT", "link_extra-col", "backlink_DNT"],
            vec![],
        );
        let catalog = ColumnCatalog::resolve(
            &LINK_TABLE,
            &source,
            &SchemaResolver::new(),
            &ProgressReporter::disconnected(),
            &Interrupt::new(),
        )
        .unwrap();
        let names: Vec<_> = catalog.columns().iter().map(|c| c.destination_name.as_str()).collect();
        assert_eq!(names, vec!["link_DNT", "link_extra_col", "backlink_DNT"]);
        assert_eq!(catalog.columns()[1].semantic_type, SemanticType::UnknownType);
        assert!(catalog.columns()[2].indexed);
    }

    #[test]
    fn test_duplicate_source_identifier_rejected() {
        let columns = vec![
            ColumnDescriptor::unknown("ATTm3"),
            ColumnDescriptor::new("cn", "ATTm3", SemanticType::Text, false),
        ];
        assert!(ColumnCatalog::new(columns).is_err());
    }

    #[test]
    fn test_colliding_destination_names_are_disambiguated() {
        let columns = vec![
            DATATABLE.columns[3].descriptor(),
            ColumnDescriptor::new("objectSid", "ATTr999", SemanticType::UnknownType, false),
        ];
        let catalog = ColumnCatalog::new(columns).unwrap();
        assert_eq!(catalog.columns()[1].destination_name, "objectSid_ATTr999");
    }

    #[test]
    fn test_renamed_column_never_reuses_a_taken_name() {
        let columns = vec![
            ColumnDescriptor::new("x_y", "a", SemanticType::Text, false),
            ColumnDescriptor::new("x", "b", SemanticType::Text, false),
            ColumnDescriptor::new("x", "y", SemanticType::Text, false),
        ];
        let catalog = ColumnCatalog::new(columns).unwrap();
        let names: Vec<_> = catalog.columns().iter().map(|c| c.destination_name.as_str()).collect();
        assert_eq!(names, vec!["x_y", "x", "x_y_y"]);
    }

    #[test]
    fn test_metatable_round_trip() {
        let catalog = ColumnCatalog::new(vec![
            DATATABLE.columns[0].descriptor(),
            ColumnDescriptor::new("common_Name", "ATTm3", SemanticType::UnknownType, false),
            ColumnDescriptor::new("nTSecurityDescriptor", "ATTp131353", SemanticType::NTSecDesc, true),
        ])
        .unwrap();
        let rows = catalog.to_metatable_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(ColumnCatalog::from_metatable_rows(&rows).unwrap(), catalog);
    }

    #[test]
    fn test_metatable_rows_from_integer_storage() {
        let rows = vec![vec![
            RawValue::from("sd_id"),
            RawValue::from("sd_id"),
            RawValue::from("Int"),
            RawValue::Int(1),
        ]];
        let catalog = ColumnCatalog::from_metatable_rows(&rows).unwrap();
        assert!(catalog.columns()[0].indexed);

        let bad = vec![vec![RawValue::from("x"), RawValue::from("x"), RawValue::from("Varchar"), RawValue::Int(0)]];
        assert!(ColumnCatalog::from_metatable_rows(&bad).is_err());
    }
}
