use crate::collect::{CollectResult, CollectedEntity, EntityKind, Endpoints};
use crate::path::{self, PathError};
use crate::schema::FieldSchema;
use crate::tree::TreeValue;
use indexmap::IndexMap;

/// Value of one field cell.
///
/// `Missing` means "no value": on export the path did not resolve, on import
/// the cell requests no edit. `Clear` is the explicit request to write an
/// empty value, which an empty cell cannot express.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Missing,
    Text(String),
    Clear,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

/// One sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub id: String,
    pub kind: EntityKind,
    pub endpoints: Option<Endpoints>,
    pub fields: IndexMap<String, FieldValue>,
}

impl FlatRecord {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        FlatRecord {
            id: id.into(),
            kind,
            endpoints: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Text of a field; `None` for absent, missing and cleared fields.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.as_text()
    }
}

/// Project every entity's visual block through the schema.
///
/// A field whose path does not resolve for an entity becomes `Missing` for
/// that entity only. Failing to reach the visual block itself means the
/// entities were not collected from `tree` and is an error.
pub fn extract(
    tree: &TreeValue,
    entities: &[CollectedEntity],
    schema: &FieldSchema,
) -> CollectResult<Vec<FlatRecord>> {
    let node_fields = schema.fields_for(EntityKind::Node);
    let edge_fields = schema.fields_for(EntityKind::Edge);

    let mut records = Vec::with_capacity(entities.len());
    for entity in entities {
        let block = entity.visual_block(tree)?;
        let fields = match entity.kind {
            EntityKind::Node => &node_fields,
            EntityKind::Edge => &edge_fields,
        };

        let mut record = FlatRecord {
            id: entity.id.clone(),
            kind: entity.kind,
            endpoints: entity.endpoints.clone(),
            fields: IndexMap::with_capacity(fields.len()),
        };
        for (&name, field_path) in fields {
            let value = match path::get_str(block, field_path) {
                Ok(text) => FieldValue::text(text),
                Err(err) => {
                    if matches!(err, PathError::InvalidSegment { .. }) {
                        tracing::warn!(kind = %entity.kind, id = %entity.id, field = name, path = %field_path, error = %err, "field path does not fit this entity");
                    } else {
                        tracing::debug!(kind = %entity.kind, id = %entity.id, field = name, error = %err, "field not present");
                    }
                    FieldValue::Missing
                }
            };
            record.fields.insert(name.to_string(), value);
        }
        records.push(record);
    }
    Ok(records)
}
