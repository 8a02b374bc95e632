// crates/graphtab-core/src/path.rs
//
// Path addressing over `TreeValue`.
// - A path is a short sequence of segments: field-map key, list index, or `*`
//   (the list must hold exactly one element; descend into it)
// - Lookups fail fast with a precise error kind; callers decide whether a
//   failure is fatal (identifiers, endpoints) or degrades to "no value"
// - `set` only ever creates the final slot; intermediate segments must exist

use crate::tree::{FieldMap, TreeValue};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("segment {position} `{segment}`: {reason}")]
    Traversal {
        position: usize,
        segment: Segment,
        reason: &'static str,
    },

    #[error("segment {position} `*`: expected a single-element list, found {len} elements")]
    SingletonViolation { position: usize, len: usize },

    #[error("expected {expected} at end of path, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("segment {position} `{segment}` cannot address a {found}")]
    InvalidSegment {
        position: usize,
        segment: Segment,
        found: &'static str,
    },

    #[error("empty path has no slot to write")]
    EmptyPath,
}

pub type PathResult<T> = Result<T, PathError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
    /// `*`: the list must contain exactly one element.
    Singleton,
}

impl Segment {
    pub fn key(name: impl Into<String>) -> Self {
        Segment::Key(name.into())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
            Segment::Singleton => f.write_str("*"),
        }
    }
}

impl From<&str> for Segment {
    fn from(text: &str) -> Self {
        if text == "*" {
            Segment::Singleton
        } else {
            Segment::Key(text.to_string())
        }
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Segment::Key(key) => s.serialize_str(key),
            Segment::Index(index) => s.serialize_u64(*index as u64),
            Segment::Singleton => s.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawSegment {
            Index(usize),
            Key(String),
        }

        match RawSegment::deserialize(d)
            .map_err(|_| D::Error::custom("path segment must be a string key, `*`, or a list index"))?
        {
            RawSegment::Index(index) => Ok(Segment::Index(index)),
            RawSegment::Key(key) if key.is_empty() => {
                Err(D::Error::custom("path segment key must not be empty"))
            }
            RawSegment::Key(key) => Ok(Segment::from(key.as_str())),
        }
    }
}

/// Owned path. Displays as `a/*/b/0`, which `FromStr` reads back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        FieldPath(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    pub fn child(&self, segment: impl Into<Segment>) -> FieldPath {
        let mut out = self.clone();
        out.push(segment);
        out
    }

    pub fn join(&self, tail: &[Segment]) -> FieldPath {
        let mut segments = Vec::with_capacity(self.0.len() + tail.len());
        segments.extend_from_slice(&self.0);
        segments.extend_from_slice(tail);
        FieldPath(segments)
    }
}

impl Deref for FieldPath {
    type Target = [Segment];

    fn deref(&self) -> &[Segment] {
        &self.0
    }
}

impl From<Vec<Segment>> for FieldPath {
    fn from(segments: Vec<Segment>) -> Self {
        FieldPath(segments)
    }
}

impl<S: Into<Segment>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FieldPath(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = std::convert::Infallible;

    /// XML names never start with a digit, so an all-digit segment is an index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split('/')
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<usize>() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::from(part),
            })
            .collect())
    }
}

pub fn get<'t>(tree: &'t TreeValue, path: &[Segment]) -> PathResult<&'t TreeValue> {
    let mut current = tree;
    for (position, segment) in path.iter().enumerate() {
        current = step(current, position, segment)?;
    }
    Ok(current)
}

pub fn get_mut<'t>(tree: &'t mut TreeValue, path: &[Segment]) -> PathResult<&'t mut TreeValue> {
    let mut current = tree;
    for (position, segment) in path.iter().enumerate() {
        current = step_mut(current, position, segment)?;
    }
    Ok(current)
}

pub fn get_str<'t>(tree: &'t TreeValue, path: &[Segment]) -> PathResult<&'t str> {
    match get(tree, path)? {
        TreeValue::Leaf(text) => Ok(text),
        other => Err(PathError::TypeMismatch {
            expected: "leaf",
            found: other.kind_name(),
        }),
    }
}

pub fn get_list<'t>(tree: &'t TreeValue, path: &[Segment]) -> PathResult<&'t [TreeValue]> {
    match get(tree, path)? {
        TreeValue::List(items) => Ok(items),
        other => Err(PathError::TypeMismatch {
            expected: "list",
            found: other.kind_name(),
        }),
    }
}

pub fn get_map<'t>(tree: &'t TreeValue, path: &[Segment]) -> PathResult<&'t FieldMap> {
    match get(tree, path)? {
        TreeValue::Map(fields) => Ok(fields),
        other => Err(PathError::TypeMismatch {
            expected: "field map",
            found: other.kind_name(),
        }),
    }
}

/// Write `value` at `path`, replacing whatever is there.
///
/// The final slot is created when absent: a missing map key is inserted, an
/// index equal to the list length appends, and `*` on an empty list pushes the
/// single element. Replacing an existing map key keeps its position.
pub fn set(tree: &mut TreeValue, path: &[Segment], value: TreeValue) -> PathResult<()> {
    let (last, parent_path) = path.split_last().ok_or(PathError::EmptyPath)?;
    let position = parent_path.len();
    let parent = get_mut(tree, parent_path)?;
    check_slot(parent, position, last)?;

    match (parent, last) {
        (TreeValue::Map(fields), Segment::Key(key)) => {
            fields.insert(key.clone(), value);
        }
        (TreeValue::List(items), Segment::Index(index)) => {
            if *index == items.len() {
                items.push(value);
            } else {
                items[*index] = value;
            }
        }
        (TreeValue::List(items), Segment::Singleton) => {
            if items.is_empty() {
                items.push(value);
            } else {
                items[0] = value;
            }
        }
        // check_slot rejected every other combination
        _ => {}
    }
    Ok(())
}

/// Whether `set(tree, path, _)` would succeed, without mutating anything.
pub fn check_settable(tree: &TreeValue, path: &[Segment]) -> PathResult<()> {
    let (last, parent_path) = path.split_last().ok_or(PathError::EmptyPath)?;
    let parent = get(tree, parent_path)?;
    check_slot(parent, parent_path.len(), last)
}

fn check_slot(parent: &TreeValue, position: usize, segment: &Segment) -> PathResult<()> {
    match (parent, segment) {
        (TreeValue::Leaf(_), _) => Err(PathError::Traversal {
            position,
            segment: segment.clone(),
            reason: "a leaf has no children",
        }),
        (TreeValue::Map(_), Segment::Key(_)) => Ok(()),
        (TreeValue::List(items), Segment::Index(index)) if *index <= items.len() => Ok(()),
        (TreeValue::List(_), Segment::Index(_)) => Err(PathError::Traversal {
            position,
            segment: segment.clone(),
            reason: "index out of range",
        }),
        (TreeValue::List(items), Segment::Singleton) if items.len() <= 1 => Ok(()),
        (TreeValue::List(items), Segment::Singleton) => Err(PathError::SingletonViolation {
            position,
            len: items.len(),
        }),
        (other, segment) => Err(PathError::InvalidSegment {
            position,
            segment: segment.clone(),
            found: other.kind_name(),
        }),
    }
}

fn step<'t>(value: &'t TreeValue, position: usize, segment: &Segment) -> PathResult<&'t TreeValue> {
    match (value, segment) {
        (TreeValue::Leaf(_), _) => Err(PathError::Traversal {
            position,
            segment: segment.clone(),
            reason: "a leaf has no children",
        }),
        (TreeValue::List(items), Segment::Index(index)) => {
            items.get(*index).ok_or_else(|| PathError::Traversal {
                position,
                segment: segment.clone(),
                reason: "index out of range",
            })
        }
        (TreeValue::List(items), Segment::Singleton) => match items.as_slice() {
            [only] => Ok(only),
            _ => Err(PathError::SingletonViolation {
                position,
                len: items.len(),
            }),
        },
        (TreeValue::Map(fields), Segment::Key(key)) => {
            fields.get(key).ok_or_else(|| PathError::Traversal {
                position,
                segment: segment.clone(),
                reason: "key not present",
            })
        }
        (other, segment) => Err(PathError::InvalidSegment {
            position,
            segment: segment.clone(),
            found: other.kind_name(),
        }),
    }
}

fn step_mut<'t>(
    value: &'t mut TreeValue,
    position: usize,
    segment: &Segment,
) -> PathResult<&'t mut TreeValue> {
    match (value, segment) {
        (TreeValue::Leaf(_), _) => Err(PathError::Traversal {
            position,
            segment: segment.clone(),
            reason: "a leaf has no children",
        }),
        (TreeValue::List(items), Segment::Index(index)) => {
            items.get_mut(*index).ok_or_else(|| PathError::Traversal {
                position,
                segment: segment.clone(),
                reason: "index out of range",
            })
        }
        (TreeValue::List(items), Segment::Singleton) => match items.as_mut_slice() {
            [only] => Ok(only),
            other => Err(PathError::SingletonViolation {
                position,
                len: other.len(),
            }),
        },
        (TreeValue::Map(fields), Segment::Key(key)) => {
            fields.get_mut(key).ok_or_else(|| PathError::Traversal {
                position,
                segment: segment.clone(),
                reason: "key not present",
            })
        }
        (other, segment) => Err(PathError::InvalidSegment {
            position,
            segment: segment.clone(),
            found: other.kind_name(),
        }),
    }
}
