use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key under which an element's own attributes are stored.
pub const ATTRIBUTES_KEY: &str = "$";

/// Key under which an element's character data is stored.
pub const TEXT_KEY: &str = "_";

/// Ordered field map. Insertion order is kept so a re-serialized document
/// lists attributes and child groups the way they were read.
pub type FieldMap = IndexMap<String, TreeValue>;

/// Schema-less document tree.
///
/// Serializes to the obvious JSON shape (string / array / object), which is
/// what `graphtab dump` prints when authoring field paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Leaf(String),
    List(Vec<TreeValue>),
    Map(FieldMap),
}

impl TreeValue {
    pub fn leaf(text: impl Into<String>) -> Self {
        TreeValue::Leaf(text.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TreeValue::Leaf(_) => "leaf",
            TreeValue::List(_) => "list",
            TreeValue::Map(_) => "field map",
        }
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            TreeValue::Leaf(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            TreeValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// The `$` attribute map of an element value, if it has one.
    pub fn attributes(&self) -> Option<&FieldMap> {
        self.as_map()?.get(ATTRIBUTES_KEY)?.as_map()
    }

    /// Single attribute lookup; `None` if the attribute is absent or not a leaf.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()?.get(name)?.as_leaf()
    }
}

impl From<&str> for TreeValue {
    fn from(text: &str) -> Self {
        TreeValue::Leaf(text.to_string())
    }
}

impl From<String> for TreeValue {
    fn from(text: String) -> Self {
        TreeValue::Leaf(text)
    }
}

impl From<Vec<TreeValue>> for TreeValue {
    fn from(items: Vec<TreeValue>) -> Self {
        TreeValue::List(items)
    }
}

impl From<FieldMap> for TreeValue {
    fn from(fields: FieldMap) -> Self {
        TreeValue::Map(fields)
    }
}
