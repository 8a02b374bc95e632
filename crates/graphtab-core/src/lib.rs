pub mod collect;
pub mod extract;
pub mod keys;
pub mod merge;
pub mod path;
pub mod provenance;
pub mod schema;
pub mod tabular;
pub mod tree;
pub mod xml;
pub use collect::{
    CollectError, CollectResult, CollectedEntity, Endpoints, EntityKind, collect, collect_all,
    collect_with,
};
pub use extract::{FieldValue, FlatRecord, extract};
pub use keys::{KeyNotFound, KeyPurpose, TypeKeyEntry, find_key_id, type_keys};
pub use merge::{MergeError, MergeReport, MergeResult, MergeWarning, merge, merge_document};
pub use path::{FieldPath, PathError, PathResult, Segment};
pub use provenance::{ProvenanceWarning, check_provenance, content_hash};
pub use schema::{FieldSchema, SchemaError};
pub use tabular::{
    SheetMetadata, TabularError, Workbook, read_rows, records_from_rows, write_rows,
};
pub use tree::{FieldMap, TreeValue};
pub use xml::{XmlError, XmlResult, parse_tree, serialize_tree};
