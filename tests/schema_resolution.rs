use ntds_ingest::interrupt::Interrupt;
use ntds_ingest::progress::ProgressReporter;
use ntds_ingest::schema::{ColumnCatalog, ColumnDescriptor, SchemaResolver, SemanticType, DATATABLE};
use ntds_ingest::source::{MemorySource, RawValue, Record};

const SCHEMA_COLUMNS: [&str; 4] = ["ATTc131102", "ATTj591540", "ATTc131104", "ATTm131532"];

fn schema_row(width: usize, id: Option<i64>, alt: Option<i64>, syntax: Option<i64>, name: Option<&str>) -> Record {
    let mut row = vec![RawValue::Null; width];
    row[0] = RawValue::from(id);
    row[1] = RawValue::from(alt);
    row[2] = RawValue::from(syntax);
    row[3] = RawValue::from(name);
    row
}

/// Object table whose first four columns are the schema columns.
fn objects(extra: &[&str], rows: &[(Option<i64>, Option<i64>, Option<i64>, Option<&str>)]) -> MemorySource {
    let mut columns: Vec<&str> = SCHEMA_COLUMNS.to_vec();
    columns.push("DNT_col");
    columns.extend(extra);
    let width = columns.len();
    let records = rows
        .iter()
        .map(|(id, alt, syntax, name)| schema_row(width, *id, *alt, *syntax, *name))
        .collect();
    MemorySource::new().with_table("datatable", columns, records)
}

fn catalog(resolver: &SchemaResolver, source: &MemorySource) -> ColumnCatalog {
    ColumnCatalog::resolve(
        &DATATABLE,
        source,
        resolver,
        &ProgressReporter::disconnected(),
        &Interrupt::new(),
    )
    .unwrap()
}

#[test]
fn test_unmapped_syntax_falls_back_to_unknown_type() {
    let source = MemorySource::new().with_table(
        "datatable",
        ["ATT131102", "ATTj591540", "ATTc131104", "ATTm131532"],
        vec![vec![
            RawValue::Int(131102),
            RawValue::Null,
            RawValue::Int(0x80004),
            RawValue::from("common-Name"),
        ]],
    );
    let catalog = catalog(&SchemaResolver::new(), &source);
    assert_eq!(
        catalog.columns()[0],
        ColumnDescriptor::new("common_Name", "ATT131102", SemanticType::UnknownType, false)
    );
    assert_eq!(catalog.columns()[1], ColumnDescriptor::unknown("ATTj591540"));
}

#[test]
fn test_early_exit_does_not_change_the_catalog() {
    let rows = [
        (Some(131102), None, Some(0x80002), Some("attributeID")),
        (Some(3), None, Some(0x8000c), Some("cn")),
        (Some(131104), None, Some(0x80009), Some("attributeSyntax")),
        (Some(9), Some(591540), Some(0x80009), Some("msDS-IntId")),
        (Some(131532), None, Some(0x8000c), Some("lDAPDisplayName")),
        (Some(131091), None, Some(0x8000b), Some("whenCreated")),
        (Some(3), None, Some(0x8000b), Some("late-duplicate")),
        (Some(1), None, Some(0x80001), Some("unrelated")),
    ];
    let source = objects(&["ATTm3", "ATTl131091"], &rows);

    let early = catalog(&SchemaResolver::new(), &source);
    let full = catalog(&SchemaResolver::without_early_exit(), &source);
    assert_eq!(early, full);

    let cn = early.columns().iter().find(|c| c.source_identifier == "ATTm3").unwrap();
    assert_eq!(cn.destination_name, "cn");
    let created = early.columns().iter().find(|c| c.source_identifier == "ATTl131091").unwrap();
    assert_eq!((created.semantic_type, created.indexed), (SemanticType::Timestamp, false));
}

#[test]
fn test_result_does_not_depend_on_schema_row_order() {
    let mut rows = vec![
        (Some(3), None, Some(0x8000c), Some("cn")),
        (Some(131091), None, Some(0x80010), Some("uSN-Created")),
        (None, Some(590126), Some(0x8000f), Some("nt-Security-Descriptor")),
        (Some(7), None, None, Some("")),
        (None, None, Some(0x80001), Some("nothing")),
    ];
    let forward = catalog(&SchemaResolver::new(), &objects(&["ATTm3", "ATTq131091", "ATTp590126"], &rows));
    rows.reverse();
    let backward = catalog(&SchemaResolver::new(), &objects(&["ATTm3", "ATTq131091", "ATTp590126"], &rows));
    assert_eq!(forward, backward);

    let sd = forward
        .columns()
        .iter()
        .find(|c| c.source_identifier == "ATTp590126")
        .unwrap();
    assert_eq!(sd.destination_name, "nt_Security_Descriptor");
    assert_eq!((sd.semantic_type, sd.indexed), (SemanticType::NTSecDesc, true));
}

#[test]
fn test_metatable_rows_rebuild_the_catalog() {
    let rows = [
        (Some(3), None, Some(0x8000c), Some("common-Name")),
        (Some(131091), None, Some(0x8000b), Some("when-Created")),
    ];
    let source = objects(&["ATTm3", "ATTl131091", "ATTk589826", "ATTb590606"], &rows);
    let original = catalog(&SchemaResolver::new(), &source);
    let rebuilt = ColumnCatalog::from_metatable_rows(&original.to_metatable_rows()).unwrap();
    assert_eq!(rebuilt, original);
    assert_eq!(rebuilt.len(), 9);
}
