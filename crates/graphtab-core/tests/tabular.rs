use graphtab_core::tabular::{CLEAR_MARKER, FORMAT_VERSION, META_PREFIX};
use graphtab_core::{
    EntityKind, Endpoints, FieldSchema, FieldValue, FlatRecord, KeyPurpose, SheetMetadata,
    TabularError, collect_all, extract, merge, parse_tree, read_rows, records_from_rows,
    write_rows,
};

fn sample_records() -> Vec<FlatRecord> {
    vec![
        FlatRecord::new("n0", EntityKind::Node)
            .with_field("label", FieldValue::text("Hello, \"world\""))
            .with_field("color", FieldValue::text("#FF0000")),
        FlatRecord::new("n1", EntityKind::Node)
            .with_field("label", FieldValue::Clear)
            .with_field("color", FieldValue::Missing),
        FlatRecord::new("e0", EntityKind::Edge)
            .with_endpoints(Endpoints::new("n0", "n1"))
            .with_field("label", FieldValue::text("multi\nline"))
            .with_field("weight", FieldValue::text("3")),
    ]
}

fn sample_metadata() -> SheetMetadata {
    let mut metadata = SheetMetadata::new(FieldSchema::yed_default().to_json().unwrap());
    metadata.source_hash = Some("ab".repeat(32));
    metadata.source_name = Some("diagram.graphml".into());
    metadata
}

#[test]
fn written_sheet_starts_with_metadata_then_header() {
    let bytes = write_rows(&sample_records(), &sample_metadata()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();

    let meta = lines.next().unwrap();
    // one quoted cell: the JSON contains commas and quotes
    assert!(meta.starts_with(&format!("\"{META_PREFIX}{{")), "{meta}");
    assert_eq!(
        lines.next(),
        Some("id,kind,source,target,label,color,weight")
    );
    assert_eq!(lines.next(), Some("n0,node,,,\"Hello, \"\"world\"\"\",#FF0000,"));
    assert_eq!(lines.next(), Some(format!("n1,node,,,{CLEAR_MARKER},,").as_str()));
}

#[test]
fn sheet_reads_back_into_the_same_records() {
    let records = sample_records();
    let metadata = sample_metadata();
    let workbook = read_rows(&write_rows(&records, &metadata).unwrap()).unwrap();

    assert_eq!(workbook.metadata.as_ref(), Some(&metadata));
    assert_eq!(workbook.rows.len(), 3);
    assert_eq!(workbook.rows[2]["label"], "multi\nline");

    let read = records_from_rows(&workbook.rows).unwrap();
    assert_eq!(read[0].field("label"), Some("Hello, \"world\""));
    assert_eq!(read[1].fields["label"], FieldValue::Clear);
    assert!(read[1].fields["color"].is_missing());
    assert_eq!(read[2].endpoints, Some(Endpoints::new("n0", "n1")));
    // nodes had no weight column value; the cell is blank
    assert!(read[0].fields["weight"].is_missing());
}

#[test]
fn stored_schema_is_opaque_json() {
    let bytes = write_rows(&sample_records(), &sample_metadata()).unwrap();
    let workbook = read_rows(&bytes).unwrap();
    let stored = workbook.metadata.unwrap().field_schema;
    assert_eq!(
        FieldSchema::from_json(&stored).unwrap(),
        FieldSchema::yed_default()
    );
}

#[test]
fn sheet_without_metadata_line_is_accepted() {
    let csv = "id,kind,source,target,label\nn0,node,,,Hi\n";
    let workbook = read_rows(csv.as_bytes()).unwrap();
    assert!(workbook.metadata.is_none());
    assert_eq!(workbook.rows.len(), 1);
    assert_eq!(workbook.rows[0]["label"], "Hi");
}

#[test]
fn rows_are_keyed_by_header_in_any_column_order() {
    let csv = "label, kind ,id\nHi,node,n0\n,,\nshort,edge\n";
    let workbook = read_rows(csv.as_bytes()).unwrap();
    // the all-blank row is dropped; the short row is padded
    assert_eq!(workbook.rows.len(), 2);
    assert_eq!(workbook.rows[0]["id"], "n0");
    assert_eq!(workbook.rows[0]["kind"], "node");
    assert_eq!(workbook.rows[1]["id"], "");
}

#[test]
fn header_needs_id_and_kind() {
    let err = read_rows(b"name,kind\nx,node\n").unwrap_err();
    assert!(matches!(err, TabularError::MissingColumn("id")));
    assert!(matches!(read_rows(b""), Err(TabularError::Empty)));
}

#[test]
fn newer_format_version_is_refused() {
    let meta = format!(
        "{META_PREFIX}{{\"format_version\":{},\"field_schema\":\"{{}}\"}}",
        FORMAT_VERSION + 1
    );
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record([meta.as_str()]).unwrap();
    writer.write_record(["id", "kind"]).unwrap();
    let bytes = writer.into_inner().unwrap();

    assert!(matches!(
        read_rows(&bytes),
        Err(TabularError::UnsupportedVersion(v)) if v == FORMAT_VERSION + 1
    ));
}

#[test]
fn rows_without_id_are_skipped() {
    let workbook = read_rows(b"id,kind,label\n,node,orphan\nn1,node,kept\n").unwrap();
    let records = records_from_rows(&workbook.rows).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "n1");
}

#[test]
fn bad_kind_and_half_endpoints_are_errors() {
    let workbook = read_rows(b"id,kind\nn0,vertex\n").unwrap();
    assert!(matches!(
        records_from_rows(&workbook.rows),
        Err(TabularError::Kind { row: 1, .. })
    ));

    let workbook = read_rows(b"id,kind,source,target\ne0,edge,n0,\n").unwrap();
    match records_from_rows(&workbook.rows) {
        Err(TabularError::PartialEndpoints { row, id }) => {
            assert_eq!(row, 1);
            assert_eq!(id, "e0");
        }
        other => panic!("expected PartialEndpoints, got {other:?}"),
    }
}

#[test]
fn marker_lookalike_text_is_escaped_and_restored() {
    let records = vec![
        FlatRecord::new("n0", EntityKind::Node)
            .with_field("a", FieldValue::text("#CLEAR"))
            .with_field("b", FieldValue::text("##CLEAR"))
            .with_field("c", FieldValue::Clear)
            .with_field("d", FieldValue::text("#CLEARED"))
            .with_field("e", FieldValue::text("CLEAR")),
    ];
    let bytes = write_rows(&records, &sample_metadata()).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("n0,node,,,##CLEAR,###CLEAR,#CLEAR,#CLEARED,CLEAR"), "{text}");

    let read = records_from_rows(&read_rows(&bytes).unwrap().rows).unwrap();
    assert_eq!(read[0].field("a"), Some("#CLEAR"));
    assert_eq!(read[0].field("b"), Some("##CLEAR"));
    assert_eq!(read[0].fields["c"], FieldValue::Clear);
    assert_eq!(read[0].field("d"), Some("#CLEARED"));
    assert_eq!(read[0].field("e"), Some("CLEAR"));
}

#[test]
fn untouched_sheet_keeps_a_marker_lookalike_label() {
    let xml = r#"<graphml xmlns:y="http://www.yworks.com/xml/graphml">
  <key for="node" id="d5" yfiles.type="nodegraphics"/>
  <key for="edge" id="d9" yfiles.type="edgegraphics"/>
  <graph id="G">
    <node id="n0">
      <data key="d5">
        <y:ShapeNode>
          <y:NodeLabel visible="true">#CLEAR</y:NodeLabel>
        </y:ShapeNode>
      </data>
    </node>
  </graph>
</graphml>"#;
    let mut tree = parse_tree(xml).unwrap();
    let before = tree.clone();
    let schema = FieldSchema::yed_default();
    let entities = collect_all(&tree, &KeyPurpose::default()).unwrap();
    let exported = extract(&tree, &entities, &schema).unwrap();
    assert_eq!(exported[0].field("label"), Some("#CLEAR"));

    let bytes = write_rows(&exported, &sample_metadata()).unwrap();
    let imported = records_from_rows(&read_rows(&bytes).unwrap().rows).unwrap();
    let report = merge(&mut tree, &entities, &imported, &schema).unwrap();

    assert_eq!(report.fields_written, 0);
    assert_eq!(tree, before);
}
