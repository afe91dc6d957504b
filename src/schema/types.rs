//! Column and table descriptors shared by the resolver, the importer and the backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic type of a destination column.
///
/// Backends decide how each type is physically stored; the names are persisted
/// verbatim in metatables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Int,
    Binary,
    Text,
    Timestamp,
    SecurityDescriptor,
    NTSecDesc,
    SID,
    GUID,
    Ancestors,
    UserAccountControl,
    UnknownType,
}

impl SemanticType {
    pub const ALL: [SemanticType; 11] = [
        SemanticType::Int,
        SemanticType::Binary,
        SemanticType::Text,
        SemanticType::Timestamp,
        SemanticType::SecurityDescriptor,
        SemanticType::NTSecDesc,
        SemanticType::SID,
        SemanticType::GUID,
        SemanticType::Ancestors,
        SemanticType::UserAccountControl,
        SemanticType::UnknownType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Int => "Int",
            SemanticType::Binary => "Binary",
            SemanticType::Text => "Text",
            SemanticType::Timestamp => "Timestamp",
            SemanticType::SecurityDescriptor => "SecurityDescriptor",
            SemanticType::NTSecDesc => "NTSecDesc",
            SemanticType::SID => "SID",
            SemanticType::GUID => "GUID",
            SemanticType::Ancestors => "Ancestors",
            SemanticType::UserAccountControl => "UserAccountControl",
            SemanticType::UnknownType => "UnknownType",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown semantic type '{}'", s))
    }
}

/// One destination column and where its values come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Storage-safe column name in the destination table
    pub destination_name: String,

    /// Raw column name in the record source (identity key within a table)
    pub source_identifier: String,

    pub semantic_type: SemanticType,

    pub indexed: bool,
}

impl ColumnDescriptor {
    pub fn new(
        destination_name: impl Into<String>,
        source_identifier: impl Into<String>,
        semantic_type: SemanticType,
        indexed: bool,
    ) -> Self {
        Self {
            destination_name: destination_name.into(),
            source_identifier: source_identifier.into(),
            semantic_type,
            indexed,
        }
    }

    /// Descriptor for a raw column nothing is known about.
    pub fn unknown(source_identifier: &str) -> Self {
        Self::new(
            normalize_column_name(source_identifier),
            source_identifier,
            SemanticType::UnknownType,
            false,
        )
    }
}

/// Compile-time column definition of a well-known table.
#[derive(Clone, Copy, Debug)]
pub struct StaticColumn {
    pub name: &'static str,
    pub attname: &'static str,
    pub semantic_type: SemanticType,
    pub indexed: bool,
}

impl StaticColumn {
    pub const fn new(
        name: &'static str,
        attname: &'static str,
        semantic_type: SemanticType,
        indexed: bool,
    ) -> Self {
        Self { name, attname, semantic_type, indexed }
    }

    pub fn descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor::new(self.name, self.attname, self.semantic_type, self.indexed)
    }
}

/// The three well-known table kinds of a directory database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    SecurityDescriptors,
    Links,
    Data,
}

impl TableKind {
    /// Fixed import order.
    pub const ORDERED: [TableKind; 3] = [TableKind::SecurityDescriptors, TableKind::Links, TableKind::Data];

    /// Accepts the aliases the command line has always accepted, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "sdtable" | "sd_table" | "sd" => Some(TableKind::SecurityDescriptors),
            "linktable" | "link_table" | "link" => Some(TableKind::Links),
            "datatable" | "data" => Some(TableKind::Data),
            _ => None,
        }
    }
}

/// Where to find the attribute definitions of a schema-driven table.
///
/// The numbers are attribute identifiers; the matching raw columns are the ones
/// whose name carries that numeric suffix (`ATTc131102` for 131102).
#[derive(Clone, Copy, Debug)]
pub struct SchemaSource {
    pub table: &'static str,
    pub attribute_id: u32,
    pub alt_identifier: u32,
    pub attribute_syntax: u32,
    pub display_name: u32,
}

/// Data-driven definition of one importable table.
#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub kind: TableKind,
    pub columns: &'static [StaticColumn],
    pub indexes: &'static [&'static str],
    /// `Some` when the remaining columns are resolved from the schema table
    pub schema: Option<SchemaSource>,
}

impl TableSpec {
    pub fn metatable_name(&self) -> String {
        metatable_name(self.name)
    }

    pub fn static_column(&self, source_identifier: &str) -> Option<&StaticColumn> {
        self.columns.iter().find(|c| c.attname == source_identifier)
    }
}

pub fn metatable_name(table: &str) -> String {
    format!("{}_meta", table)
}

/// Replace every character that is not ASCII alphanumeric or `_` with `_`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Numeric attribute identifier carried by a raw column name.
///
/// Raw attribute columns are named `ATT` + one syntax letter + decimal id; the
/// syntax letter is optional.
pub fn attribute_id_of(raw_name: &str) -> Option<u32> {
    let rest = raw_name.strip_prefix("ATT")?;
    let digits = match rest.chars().next()? {
        c if c.is_ascii_alphabetic() => &rest[1..],
        _ => rest,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
