// Fixture plumbing shared by the integration tests.
#![allow(dead_code)]

use std::{
    env, fs,
    path::{Component, Path, PathBuf},
};

use graphtab_core::{KeyPurpose, TreeValue, collect_all, parse_tree};
use similar::TextDiff;
use walkdir::WalkDir;

pub fn fixtures_root() -> PathBuf {
    // CARGO_MANIFEST_DIR = crates/graphtab-core
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent() // crates/
        .and_then(|p| p.parent()) // repo root
        .unwrap_or(&manifest_dir)
        .join("fixtures")
}

pub fn corpus_dir() -> PathBuf {
    fixtures_root().join("corpus")
}

pub fn expected_dir() -> PathBuf {
    fixtures_root().join("expected")
}

pub fn corpus_file(name: &str) -> PathBuf {
    corpus_dir().join(name)
}

/// Every `.graphml` file under fixtures/corpus, sorted.
pub fn corpus_documents() -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(corpus_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("graphml"))
        })
        .collect();
    out.sort();
    out
}

pub fn rel_fixture_path(path: &Path) -> String {
    path.strip_prefix(corpus_dir())
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn read_to_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

pub fn write_string(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create dir {}: {e}", parent.display()));
    }
    fs::write(path, contents).unwrap_or_else(|e| panic!("Failed to write {}: {e}", path.display()));
}

pub fn is_update_enabled() -> bool {
    match env::var("UPDATE_EXPECTED") {
        Ok(v) => !v.trim().is_empty() && v != "0" && v.to_lowercase() != "false",
        Err(_) => false,
    }
}

pub fn diff_strings(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    diff.unified_diff().header("expected", "actual").to_string()
}

pub fn load_tree(name: &str) -> TreeValue {
    let path = corpus_file(name);
    parse_tree(&read_to_string(&path))
        .unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}

/// Minimal yEd-shaped document: one node key `d5`, one edge key `d9`.
pub fn graphml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:y="http://www.yworks.com/xml/graphml">
  <key for="node" id="d5" yfiles.type="nodegraphics"/>
  <key for="edge" id="d9" yfiles.type="edgegraphics"/>
  <graph edgedefault="directed" id="G">
{body}
  </graph>
</graphml>
"#
    )
}

pub fn shape_node(id: &str, label: &str, color: &str) -> String {
    format!(
        r#"    <node id="{id}">
      <data key="d5">
        <y:ShapeNode>
          <y:Fill color="{color}" transparent="false"/>
          <y:NodeLabel visible="true">{label}</y:NodeLabel>
        </y:ShapeNode>
      </data>
    </node>"#
    )
}

pub fn poly_edge(id: &str, source: &str, target: &str, label: &str) -> String {
    format!(
        r##"    <edge id="{id}" source="{source}" target="{target}">
      <data key="d9">
        <y:PolyLineEdge>
          <y:LineStyle color="#000000" type="line" width="1.0"/>
          <y:EdgeLabel visible="true">{label}</y:EdgeLabel>
        </y:PolyLineEdge>
      </data>
    </edge>"##
    )
}

pub fn ids(tree: &TreeValue) -> Vec<String> {
    collect_all(tree, &KeyPurpose::default())
        .expect("collect")
        .into_iter()
        .map(|entity| entity.id)
        .collect()
}
