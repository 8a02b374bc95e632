use crate::collect::EntityKind;
use crate::path::{self, Segment};
use crate::tree::{FieldMap, TreeValue};

/// Root element of a GraphML document.
pub const ROOT_ELEMENT: &str = "graphml";

/// Element name of a key declaration.
pub const KEY_ELEMENT: &str = "key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no <key> declaration has {attribute}=\"{value}\"")]
pub struct KeyNotFound {
    pub attribute: String,
    pub value: String,
}

/// How the document header tags the key that carries visual data per kind.
///
/// yEd writes `<key for="node" id="d6" yfiles.type="nodegraphics"/>`, which is
/// the default here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPurpose {
    pub attribute: String,
    pub node: String,
    pub edge: String,
}

impl Default for KeyPurpose {
    fn default() -> Self {
        KeyPurpose {
            attribute: "yfiles.type".to_string(),
            node: "nodegraphics".to_string(),
            edge: "edgegraphics".to_string(),
        }
    }
}

impl KeyPurpose {
    pub fn value_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Node => &self.node,
            EntityKind::Edge => &self.edge,
        }
    }
}

/// One `<key>` declaration, borrowed from the document tree.
#[derive(Debug, Clone, Copy)]
pub struct TypeKeyEntry<'t> {
    pub id: &'t str,
    pub attributes: &'t FieldMap,
}

impl<'t> TypeKeyEntry<'t> {
    pub fn from_element(element: &'t TreeValue) -> Option<Self> {
        let attributes = element.attributes()?;
        let id = attributes.get("id")?.as_leaf()?;
        Some(TypeKeyEntry { id, attributes })
    }

    pub fn attribute(&self, name: &str) -> Option<&'t str> {
        self.attributes.get(name)?.as_leaf()
    }
}

/// All key declarations of the document, in document order.
///
/// A document without any `<key>` yields an empty list; declarations without
/// an `id` cannot be referenced by data blocks and are skipped.
pub fn type_keys(tree: &TreeValue) -> Vec<TypeKeyEntry<'_>> {
    let keys_path = [Segment::key(ROOT_ELEMENT), Segment::key(KEY_ELEMENT)];
    let Ok(elements) = path::get_list(tree, &keys_path) else {
        return Vec::new();
    };
    elements
        .iter()
        .filter_map(|element| {
            let entry = TypeKeyEntry::from_element(element);
            if entry.is_none() {
                tracing::debug!("skipping <key> declaration without id");
            }
            entry
        })
        .collect()
}

/// Id of the first declared key whose `attribute` equals `value`.
pub fn find_key_id<'t>(
    keys: &[TypeKeyEntry<'t>],
    attribute: &str,
    value: &str,
) -> Result<&'t str, KeyNotFound> {
    keys.iter()
        .find(|entry| entry.attribute(attribute) == Some(value))
        .map(|entry| entry.id)
        .ok_or_else(|| KeyNotFound {
            attribute: attribute.to_string(),
            value: value.to_string(),
        })
}
