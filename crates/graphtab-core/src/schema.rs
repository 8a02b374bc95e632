use crate::collect::EntityKind;
use crate::path::FieldPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column names the sheet reserves for identity and endpoints.
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "kind", "source", "target"];

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` ({scope}): path is empty")]
    EmptyPath { scope: &'static str, field: String },

    #[error("field `{field}` ({scope}): `{field}` is a reserved column name")]
    ReservedName { scope: &'static str, field: String },
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Output field name -> path inside an entity's visual-data block.
///
/// Entries under `node`/`edge` override same-named `common` entries for that
/// kind. Field order is kept and becomes the sheet's column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub common: IndexMap<String, FieldPath>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub node: IndexMap<String, FieldPath>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub edge: IndexMap<String, FieldPath>,
}

impl FieldSchema {
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let schema: FieldSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Single-line JSON, as stored in sheet metadata.
    pub fn to_json(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SchemaResult<()> {
        let scopes = [
            ("common", &self.common),
            ("node", &self.node),
            ("edge", &self.edge),
        ];
        for (scope, fields) in scopes {
            for (field, path) in fields {
                if RESERVED_COLUMNS.contains(&field.as_str()) {
                    return Err(SchemaError::ReservedName {
                        scope,
                        field: field.clone(),
                    });
                }
                if path.is_empty() {
                    return Err(SchemaError::EmptyPath {
                        scope,
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn scoped(&self, kind: EntityKind) -> &IndexMap<String, FieldPath> {
        match kind {
            EntityKind::Node => &self.node,
            EntityKind::Edge => &self.edge,
        }
    }

    /// Effective fields for `kind`: `common` overlaid with the kind's own map.
    pub fn fields_for(&self, kind: EntityKind) -> IndexMap<&str, &FieldPath> {
        let mut fields: IndexMap<&str, &FieldPath> = self
            .common
            .iter()
            .map(|(name, path)| (name.as_str(), path))
            .collect();
        for (name, path) in self.scoped(kind) {
            fields.insert(name.as_str(), path);
        }
        fields
    }

    pub fn field_for(&self, kind: EntityKind, name: &str) -> Option<&FieldPath> {
        self.scoped(kind).get(name).or_else(|| self.common.get(name))
    }

    /// Fields for plain yEd shape nodes and poly-line edges.
    ///
    /// Other yEd element types (generic nodes, group nodes, arcs) nest their
    /// data differently and simply export empty cells for these fields.
    pub fn yed_default() -> Self {
        let shape_node = |tail: &str| -> FieldPath {
            FieldPath::from_iter(["y:ShapeNode", "*"].into_iter().chain(tail.split('/')))
        };
        let poly_line = |tail: &str| -> FieldPath {
            FieldPath::from_iter(["y:PolyLineEdge", "*"].into_iter().chain(tail.split('/')))
        };

        let node = [
            ("label", shape_node("y:NodeLabel/*/_")),
            ("fill_color", shape_node("y:Fill/*/$/color")),
            ("shape", shape_node("y:Shape/*/$/type")),
            ("x", shape_node("y:Geometry/*/$/x")),
            ("y", shape_node("y:Geometry/*/$/y")),
            ("width", shape_node("y:Geometry/*/$/width")),
            ("height", shape_node("y:Geometry/*/$/height")),
        ];
        let edge = [
            ("label", poly_line("y:EdgeLabel/*/_")),
            ("line_color", poly_line("y:LineStyle/*/$/color")),
            ("line_type", poly_line("y:LineStyle/*/$/type")),
        ];

        FieldSchema {
            common: IndexMap::new(),
            node: node
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
            edge: edge
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
        }
    }
}
