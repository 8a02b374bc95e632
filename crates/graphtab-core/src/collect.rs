// crates/graphtab-core/src/collect.rs
//
// Entity collection over a parsed GraphML tree.
// - The visual-data key id is resolved once per kind from the <key> header
// - Nodes and edges are visited in document order; nested graphs (yEd group
//   and folder nodes) are walked depth-first where they appear
// - Identifiers, edge endpoints and the single visual-data block are mandatory:
//   any failure there aborts the whole collection
// - Identifiers are unique per kind; a repeated id aborts the collection too
// - Entities hold absolute paths into the tree, not copies, so merge writes
//   land in the structure that is serialized afterwards

use crate::keys::{KeyNotFound, KeyPurpose, ROOT_ELEMENT, find_key_id, type_keys};
use crate::path::{self, FieldPath, PathError, PathResult, Segment};
use crate::tree::{ATTRIBUTES_KEY, TreeValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const GRAPH_ELEMENT: &str = "graph";
pub const DATA_ELEMENT: &str = "data";

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    KeyNotFound(#[from] KeyNotFound),

    #[error("{element}: {source}")]
    MandatoryPath {
        element: FieldPath,
        #[source]
        source: PathError,
    },

    #[error("{kind} `{id}` has {matches} data blocks tagged `{key_id}`, expected exactly one")]
    DataBlockAmbiguity {
        kind: EntityKind,
        id: String,
        key_id: String,
        matches: usize,
    },

    #[error("{kind} id `{id}` occurs more than once ({first} and {second})")]
    DuplicateId {
        kind: EntityKind,
        id: String,
        first: FieldPath,
        second: FieldPath,
    },
}

pub type CollectResult<T> = Result<T, CollectError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Node, EntityKind::Edge];

    /// Also the GraphML element name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind `{0}`, expected `node` or `edge`")]
pub struct UnknownKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "node" => Ok(EntityKind::Node),
            "edge" => Ok(EntityKind::Edge),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoints {
    pub source: String,
    pub target: String,
}

impl Endpoints {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Endpoints {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// One node or edge of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedEntity {
    pub id: String,
    pub kind: EntityKind,
    /// Present iff `kind` is `Edge`.
    pub endpoints: Option<Endpoints>,
    /// Absolute path of the `<node>`/`<edge>` element.
    pub element: FieldPath,
    /// Absolute path of the `<data>` element holding the visual data.
    pub visual_block: FieldPath,
}

impl CollectedEntity {
    pub fn own_attributes_path(&self) -> FieldPath {
        self.element.child(ATTRIBUTES_KEY)
    }

    /// The visual-data block; always a field map for a collected entity.
    pub fn visual_block<'t>(&self, tree: &'t TreeValue) -> CollectResult<&'t TreeValue> {
        mandatory(&self.visual_block, path::get(tree, &self.visual_block))
    }
}

pub fn collect(tree: &TreeValue, kind: EntityKind) -> CollectResult<Vec<CollectedEntity>> {
    collect_with(tree, kind, &KeyPurpose::default())
}

pub fn collect_with(
    tree: &TreeValue,
    kind: EntityKind,
    purpose: &KeyPurpose,
) -> CollectResult<Vec<CollectedEntity>> {
    let keys = type_keys(tree);
    let key_id = find_key_id(&keys, &purpose.attribute, purpose.value_for(kind))?;

    let mut collector = Collector {
        tree,
        kind,
        key_id,
        out: Vec::new(),
        seen: HashMap::new(),
    };
    collector.walk_graphs(&FieldPath::from_iter([ROOT_ELEMENT]))?;

    tracing::debug!(%kind, key_id, count = collector.out.len(), "collected entities");
    Ok(collector.out)
}

/// Nodes followed by edges.
pub fn collect_all(tree: &TreeValue, purpose: &KeyPurpose) -> CollectResult<Vec<CollectedEntity>> {
    let mut out = collect_with(tree, EntityKind::Node, purpose)?;
    out.extend(collect_with(tree, EntityKind::Edge, purpose)?);
    Ok(out)
}

struct Collector<'t> {
    tree: &'t TreeValue,
    kind: EntityKind,
    key_id: &'t str,
    out: Vec<CollectedEntity>,
    /// id -> index into `out`
    seen: HashMap<&'t str, usize>,
}

impl<'t> Collector<'t> {
    /// Visit every `<graph>` child of the element at `owner`.
    fn walk_graphs(&mut self, owner: &FieldPath) -> CollectResult<()> {
        let graphs = owner.child(GRAPH_ELEMENT);
        for index in 0..self.list_len(&graphs) {
            self.walk_graph(&graphs.child(index))?;
        }
        Ok(())
    }

    fn walk_graph(&mut self, graph: &FieldPath) -> CollectResult<()> {
        let nodes = graph.child(EntityKind::Node.as_str());
        for index in 0..self.list_len(&nodes) {
            let node = nodes.child(index);
            if self.kind == EntityKind::Node {
                self.visit(&node)?;
            }
            self.walk_graphs(&node)?;
        }

        if self.kind == EntityKind::Edge {
            let edges = graph.child(EntityKind::Edge.as_str());
            for index in 0..self.list_len(&edges) {
                self.visit(&edges.child(index))?;
            }
        }
        Ok(())
    }

    fn visit(&mut self, at: &FieldPath) -> CollectResult<()> {
        let element = mandatory(at, path::get(self.tree, at))?;
        let id = mandatory(at, path::get_str(element, &attribute_path("id")))?;

        let endpoints = match self.kind {
            EntityKind::Node => None,
            EntityKind::Edge => Some(Endpoints {
                source: mandatory(at, path::get_str(element, &attribute_path("source")))?
                    .to_string(),
                target: mandatory(at, path::get_str(element, &attribute_path("target")))?
                    .to_string(),
            }),
        };

        let matches: Vec<usize> = element
            .as_map()
            .and_then(|fields| fields.get(DATA_ELEMENT))
            .and_then(TreeValue::as_list)
            .map(|blocks| {
                blocks
                    .iter()
                    .enumerate()
                    .filter(|(_, block)| block.attribute("key") == Some(self.key_id))
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(&first) = self.seen.get(id) {
            return Err(CollectError::DuplicateId {
                kind: self.kind,
                id: id.to_string(),
                first: self.out[first].element.clone(),
                second: at.clone(),
            });
        }

        let [index] = matches.as_slice() else {
            return Err(CollectError::DataBlockAmbiguity {
                kind: self.kind,
                id: id.to_string(),
                key_id: self.key_id.to_string(),
                matches: matches.len(),
            });
        };

        self.seen.insert(id, self.out.len());
        self.out.push(CollectedEntity {
            id: id.to_string(),
            kind: self.kind,
            endpoints,
            element: at.clone(),
            visual_block: at.child(DATA_ELEMENT).child(*index),
        });
        Ok(())
    }

    fn list_len(&self, at: &FieldPath) -> usize {
        path::get_list(self.tree, at).map_or(0, <[TreeValue]>::len)
    }
}

fn attribute_path(name: &str) -> [Segment; 2] {
    [Segment::key(ATTRIBUTES_KEY), Segment::key(name)]
}

fn mandatory<T>(element: &FieldPath, result: PathResult<T>) -> CollectResult<T> {
    result.map_err(|source| CollectError::MandatoryPath {
        element: element.clone(),
        source,
    })
}
