// crates/graphtab-core/src/merge.rs
//
// Writes edited sheet rows back into the document tree.
// - Rows are matched to collected entities by (kind, id)
// - Only `path::set` is used; nothing outside the addressed slots changes
// - All writes are planned and checked against the tree first, then applied,
//   so a bad schema path aborts before the tree is touched
// - Rows for unknown entities and cells for unknown fields are skipped with a
//   warning; sheets routinely lag behind the document
// - A column no kind of the schema knows is reported once, blank or not; a
//   column only the other kind knows is reported per non-blank cell

use crate::collect::{CollectError, CollectedEntity, EntityKind, collect_all};
use crate::extract::{FieldValue, FlatRecord};
use crate::keys::KeyPurpose;
use crate::path::{self, FieldPath, PathError};
use crate::schema::FieldSchema;
use crate::tree::TreeValue;
use indexmap::IndexSet;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("{kind} `{id}`: cannot write `{field}` at {path}: {source}")]
    Write {
        kind: EntityKind,
        id: String,
        field: String,
        path: FieldPath,
        #[source]
        source: PathError,
    },
}

pub type MergeResult<T> = Result<T, MergeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeWarning {
    #[error("no {kind} `{id}` in the document; row skipped")]
    UnknownEntity { kind: EntityKind, id: String },
    #[error("{kind} `{id}`: `{field}` is not a {kind} field; cell skipped")]
    UnknownField {
        kind: EntityKind,
        id: String,
        field: String,
    },

    #[error("column `{field}` is not in the field schema; column skipped")]
    UnknownColumn { field: String },

    #[error("node `{id}`: nodes have no endpoints; source/target ignored")]
    EndpointsOnNode { id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub entities_updated: usize,
    pub fields_written: usize,
    pub endpoints_rewritten: usize,
    pub warnings: Vec<MergeWarning>,
}

impl MergeReport {
    fn warn(&mut self, warning: MergeWarning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }
}

struct PlannedWrite<'a> {
    entity: &'a CollectedEntity,
    field: &'a str,
    target: FieldPath,
    value: String,
}

/// Merge `edited` into `tree`. `entities` must have been collected from this
/// tree and the tree must not change in between.
pub fn merge(
    tree: &mut TreeValue,
    entities: &[CollectedEntity],
    edited: &[FlatRecord],
    schema: &FieldSchema,
) -> MergeResult<MergeReport> {
    let by_identity: HashMap<(EntityKind, &str), &CollectedEntity> = entities
        .iter()
        .map(|entity| ((entity.kind, entity.id.as_str()), entity))
        .collect();

    let mut report = MergeReport::default();
    let mut plan: Vec<PlannedWrite<'_>> = Vec::new();

    let mut stale_columns: IndexSet<&str> = IndexSet::new();
    for record in edited {
        for field in record.fields.keys() {
            if EntityKind::ALL
                .iter()
                .all(|&kind| schema.field_for(kind, field).is_none())
            {
                stale_columns.insert(field.as_str());
            }
        }
    }
    for field in &stale_columns {
        report.warn(MergeWarning::UnknownColumn {
            field: field.to_string(),
        });
    }

    for record in edited {
        let Some(&entity) = by_identity.get(&(record.kind, record.id.as_str())) else {
            report.warn(MergeWarning::UnknownEntity {
                kind: record.kind,
                id: record.id.clone(),
            });
            continue;
        };
        let planned_before = plan.len();

        if let Some(endpoints) = &record.endpoints {
            match entity.kind {
                EntityKind::Node => report.warn(MergeWarning::EndpointsOnNode {
                    id: entity.id.clone(),
                }),
                EntityKind::Edge => {
                    let attributes = entity.own_attributes_path();
                    let mut rewritten = false;
                    let pairs = [("source", &endpoints.source), ("target", &endpoints.target)];
                    for (name, value) in pairs {
                        let target = attributes.child(name);
                        if path::get_str(tree, &target).ok() == Some(value.as_str()) {
                            continue;
                        }
                        check(tree, entity, name, &target)?;
                        plan.push(PlannedWrite {
                            entity,
                            field: name,
                            target,
                            value: value.clone(),
                        });
                        rewritten = true;
                    }
                    if rewritten {
                        report.endpoints_rewritten += 1;
                    }
                }
            }
        }

        for (field, value) in &record.fields {
            let Some(field_path) = schema.field_for(entity.kind, field) else {
                if !value.is_missing() && !stale_columns.contains(field.as_str()) {
                    report.warn(MergeWarning::UnknownField {
                        kind: entity.kind,
                        id: entity.id.clone(),
                        field: field.clone(),
                    });
                }
                continue;
            };
            let text = match value {
                FieldValue::Missing => continue,
                FieldValue::Text(text) => text.as_str(),
                FieldValue::Clear => "",
            };

            let target = entity.visual_block.join(field_path);
            if path::get_str(tree, &target).ok() == Some(text) {
                continue;
            }
            check(tree, entity, field, &target)?;
            plan.push(PlannedWrite {
                entity,
                field,
                target,
                value: text.to_string(),
            });
            report.fields_written += 1;
        }

        if plan.len() > planned_before {
            report.entities_updated += 1;
        }
    }

    for write in plan {
        path::set(tree, &write.target, TreeValue::leaf(write.value)).map_err(|source| {
            MergeError::Write {
                kind: write.entity.kind,
                id: write.entity.id.clone(),
                field: write.field.to_string(),
                path: write.target.clone(),
                source,
            }
        })?;
    }

    tracing::info!(
        entities = report.entities_updated,
        fields = report.fields_written,
        endpoints = report.endpoints_rewritten,
        warnings = report.warnings.len(),
        "merge complete"
    );
    Ok(report)
}

/// Collect both kinds from `tree` and merge `edited` into it.
pub fn merge_document(
    tree: &mut TreeValue,
    edited: &[FlatRecord],
    schema: &FieldSchema,
    purpose: &KeyPurpose,
) -> MergeResult<MergeReport> {
    let entities = collect_all(tree, purpose)?;
    merge(tree, &entities, edited, schema)
}

fn check(
    tree: &TreeValue,
    entity: &CollectedEntity,
    field: &str,
    target: &FieldPath,
) -> MergeResult<()> {
    // Only leaves are replaced; overwriting a subtree would drop structure
    // the sheet never exported.
    let settable = match path::get(tree, target) {
        Ok(TreeValue::Leaf(_)) => Ok(()),
        Ok(other) => Err(PathError::TypeMismatch {
            expected: "leaf",
            found: other.kind_name(),
        }),
        Err(_) => path::check_settable(tree, target),
    };
    settable.map_err(|source| MergeError::Write {
        kind: entity.kind,
        id: entity.id.clone(),
        field: field.to_string(),
        path: target.clone(),
        source,
    })
}
