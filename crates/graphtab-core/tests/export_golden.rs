mod helpers;

use std::path::{Path, PathBuf};

use graphtab_core::{
    FieldSchema, KeyPurpose, SheetMetadata, collect_all, content_hash, extract, parse_tree,
    read_rows, write_rows,
};
use helpers::{
    corpus_dir, corpus_documents, diff_strings, expected_dir, is_update_enabled, read_to_string,
    rel_fixture_path, write_string,
};

fn expected_path_for(document: &Path) -> PathBuf {
    let rel = document
        .strip_prefix(corpus_dir())
        .expect("document must be under fixtures/corpus");
    expected_dir().join(rel).with_extension("csv")
}

/// Export the document with the built-in schema; returns the full sheet.
fn export_sheet(xml: &str) -> String {
    let tree = parse_tree(xml).expect("parse");
    let entities = collect_all(&tree, &KeyPurpose::default()).expect("collect");
    let schema = FieldSchema::yed_default();
    let records = extract(&tree, &entities, &schema).expect("extract");

    let mut metadata = SheetMetadata::new(schema.to_json().expect("schema json"));
    metadata.source_hash = Some(content_hash(xml.as_bytes()));
    let bytes = write_rows(&records, &metadata).expect("write rows");
    String::from_utf8(bytes)
        .expect("utf8 sheet")
        .replace("\r\n", "\n")
}

/// Everything after the metadata line; the hash makes that line fixture-specific.
fn sheet_body(sheet: &str) -> &str {
    sheet.split_once('\n').map_or("", |(_, body)| body)
}

#[test]
fn export_matches_expected_csv() {
    let update = is_update_enabled();
    let mut failures: Vec<String> = Vec::new();

    for document in corpus_documents() {
        let rel = rel_fixture_path(&document);
        let expected_path = expected_path_for(&document);
        let sheet = export_sheet(&read_to_string(&document));
        let actual = sheet_body(&sheet);

        if !expected_path.exists() {
            if update {
                write_string(&expected_path, actual);
            } else {
                failures.push(format!(
                    "Missing expected CSV for {rel}\nExpected at: {}\nRun with UPDATE_EXPECTED=1 to generate.",
                    expected_path.display()
                ));
            }
            continue;
        }

        let expected = read_to_string(&expected_path).replace("\r\n", "\n");
        if expected != actual {
            if update {
                write_string(&expected_path, actual);
                continue;
            }
            failures.push(format!(
                "Mismatch for fixture: {rel}\nExpected: {}\n{}\nTip: set UPDATE_EXPECTED=1 to update fixtures.",
                expected_path.display(),
                diff_strings(&expected, actual)
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "Export mismatches found ({}):\n\n{}",
            failures.len(),
            failures.join("\n\n---\n\n")
        );
    }
}

#[test]
fn metadata_line_carries_hash_and_schema() {
    let xml = read_to_string(&corpus_dir().join("simple.graphml"));
    let sheet = export_sheet(&xml);
    let workbook = read_rows(sheet.as_bytes()).expect("read back");

    let metadata = workbook.metadata.expect("metadata line");
    assert_eq!(metadata.source_hash, Some(content_hash(xml.as_bytes())));
    assert_eq!(
        FieldSchema::from_json(&metadata.field_schema).unwrap(),
        FieldSchema::yed_default()
    );
    assert_eq!(workbook.rows.len(), 5);
}
