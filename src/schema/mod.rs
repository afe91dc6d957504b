//! Schema Module
//!
//! Static table definitions, attribute-syntax typing, column-name resolution
//! against the embedded schema, and the resolved per-table column catalog.

pub mod catalog;
pub mod resolver;
pub mod tables;
pub mod type_mapper;
pub mod types;

pub use catalog::{meta_descriptors, ColumnCatalog, META_COLUMNS};
pub use resolver::{SchemaResolver, SchemaRow};
pub use tables::{spec_for, DATATABLE, LINK_TABLE, SD_TABLE};
pub use type_mapper::{syntax_to_type, AttributeSyntax};
pub use types::{
    attribute_id_of, metatable_name, normalize_column_name, ColumnDescriptor, SchemaSource,
    SemanticType, StaticColumn, TableKind, TableSpec,
};
