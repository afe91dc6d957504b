//! Definitions of the three well-known tables of a directory database.

use super::types::{SchemaSource, SemanticType::*, StaticColumn, TableKind, TableSpec};

pub static SD_TABLE: TableSpec = TableSpec {
    name: "sd_table",
    kind: TableKind::SecurityDescriptors,
    columns: &[
        StaticColumn::new("sd_id", "sd_id", Int, true),
        StaticColumn::new("sd_hash", "sd_hash", Binary, true),
        StaticColumn::new("sd_refcount", "sd_refcount", Int, true),
        StaticColumn::new("sd_value", "sd_value", SecurityDescriptor, false),
    ],
    indexes: &[],
    schema: None,
};

pub static LINK_TABLE: TableSpec = TableSpec {
    name: "link_table",
    kind: TableKind::Links,
    columns: &[
        StaticColumn::new("link_DNT", "link_DNT", Int, true),
        StaticColumn::new("backlink_DNT", "backlink_DNT", Int, true),
        StaticColumn::new("link_base", "link_base", Int, true),
        StaticColumn::new("link_deactivetime", "link_deactivetime", Timestamp, true),
        StaticColumn::new("link_deltime", "link_deltime", Timestamp, true),
        StaticColumn::new("link_usnchanged", "link_usnchanged", Int, true),
        StaticColumn::new("link_ncdnt", "link_ncdnt", Int, true),
        StaticColumn::new("link_metadata", "link_metadata", Binary, true),
        StaticColumn::new("link_data", "link_data", Binary, true),
        StaticColumn::new("link_ndesc", "link_ndesc", Text, true),
    ],
    indexes: &[],
    schema: None,
};

/// The object table. Its attribute columns are described by rows of the same
/// table (attribute-schema objects).
pub static DATATABLE: TableSpec = TableSpec {
    name: "datatable",
    kind: TableKind::Data,
    columns: &[
        StaticColumn::new("DNT_col", "DNT_col", Int, true),
        StaticColumn::new("PDNT_col", "PDNT_col", Int, true),
        StaticColumn::new("time_col", "time_col", Timestamp, true),
        StaticColumn::new("objectSid", "ATTr589970", SID, true),
        StaticColumn::new("objectGUID", "ATTk589826", GUID, true),
        StaticColumn::new("schemaIDGUID", "ATTk589972", GUID, true),
        StaticColumn::new("Ancestors_col", "Ancestors_col", Ancestors, true),
        StaticColumn::new("userAccountControl", "ATTj589832", UserAccountControl, false),
    ],
    indexes: &["rightsGuid"],
    schema: Some(SchemaSource {
        table: "datatable",
        attribute_id: 131102,    // ATTc131102
        alt_identifier: 591540,  // ATTj591540, msDS-IntId
        attribute_syntax: 131104, // ATTc131104
        display_name: 131532,    // ATTm131532, lDAPDisplayName
    }),
};

pub fn spec_for(kind: TableKind) -> &'static TableSpec {
    match kind {
        TableKind::SecurityDescriptors => &SD_TABLE,
        TableKind::Links => &LINK_TABLE,
        TableKind::Data => &DATATABLE,
    }
}
