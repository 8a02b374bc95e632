// crates/graphtab-core/src/tabular.rs
//
// CSV sheet I/O.
// - Line 1 is a single-cell record `#graphtab-meta <json>` holding the sheet
//   metadata (format version, source hash, field schema); spreadsheet tools
//   keep it intact because it is an ordinary quoted cell
// - Then a header row `id,kind,source,target,<fields...>` and one row per entity
// - An empty cell means "no value"; `#CLEAR` requests an explicit empty value
// - Text that looks like the marker (`#CLEAR`, `##CLEAR`, ...) is written with
//   one extra leading `#`, which the reader strips again

use crate::collect::{EntityKind, Endpoints, UnknownKind};
use crate::extract::{FieldValue, FlatRecord};
use crate::schema::RESERVED_COLUMNS;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const META_PREFIX: &str = "#graphtab-meta ";
pub const CLEAR_MARKER: &str = "#CLEAR";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("metadata json: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sheet is empty")]
    Empty,

    #[error("sheet format version {0} is newer than supported version {FORMAT_VERSION}")]
    UnsupportedVersion(u32),

    #[error("sheet has no `{0}` column")]
    MissingColumn(&'static str),

    #[error("row {row}: {source}")]
    Kind {
        row: usize,
        #[source]
        source: UnknownKind,
    },

    #[error("row {row}: edge `{id}` needs both source and target, or neither")]
    PartialEndpoints { row: usize, id: String },
}

pub type TabularResult<T> = Result<T, TabularError>;

/// Header-keyed cells of one data row, in column order.
pub type RawRow = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMetadata {
    pub format_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,

    /// Field schema JSON, stored verbatim.
    pub field_schema: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl SheetMetadata {
    pub fn new(field_schema: impl Into<String>) -> Self {
        SheetMetadata {
            format_version: FORMAT_VERSION,
            source_hash: None,
            field_schema: field_schema.into(),
            source_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbook {
    /// `None` for sheets that lost or never had the metadata line.
    pub metadata: Option<SheetMetadata>,
    pub rows: Vec<RawRow>,
}

pub fn write_rows(records: &[FlatRecord], metadata: &SheetMetadata) -> TabularResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    writer.write_record([format!("{META_PREFIX}{}", serde_json::to_string(metadata)?)])?;

    let columns = field_columns(records);
    let mut header: Vec<&str> = RESERVED_COLUMNS.to_vec();
    header.extend(columns.iter().copied());
    writer.write_record(&header)?;

    for record in records {
        let (source, target) = record
            .endpoints
            .as_ref()
            .map_or(("", ""), |e| (e.source.as_str(), e.target.as_str()));
        let mut cells: Vec<Cow<'_, str>> = [record.id.as_str(), record.kind.as_str(), source, target]
            .into_iter()
            .map(Cow::Borrowed)
            .collect();
        for column in &columns {
            cells.push(match record.fields.get(*column) {
                Some(FieldValue::Text(text)) => text_cell(text),
                Some(FieldValue::Clear) => Cow::Borrowed(CLEAR_MARKER),
                Some(FieldValue::Missing) | None => Cow::Borrowed(""),
            });
        }
        writer.write_record(cells.iter().map(|cell| cell.as_bytes()))?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| TabularError::Io(err.into_error()))
}

pub fn read_rows(bytes: &[u8]) -> TabularResult<Workbook> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut lines = reader.records();

    let mut first = next_record(&mut lines)?;
    let meta_json = first
        .get(0)
        .and_then(|cell| cell.strip_prefix(META_PREFIX))
        .map(str::to_string);
    let metadata = match meta_json {
        Some(json) => {
            let metadata: SheetMetadata = serde_json::from_str(&json)?;
            if metadata.format_version > FORMAT_VERSION {
                return Err(TabularError::UnsupportedVersion(metadata.format_version));
            }
            first = next_record(&mut lines)?;
            Some(metadata)
        }
        None => {
            tracing::warn!("sheet has no metadata line");
            None
        }
    };

    let header: Vec<String> = first.iter().map(|name| name.trim().to_string()).collect();
    for required in ["id", "kind"] {
        if !header.iter().any(|name| name == required) {
            return Err(TabularError::MissingColumn(required));
        }
    }

    let mut rows = Vec::new();
    for line in lines {
        let line = line?;
        if line.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: RawRow = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(index, name)| (name.clone(), line.get(index).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(Workbook { metadata, rows })
}

/// Turn sheet rows into records for the merge.
pub fn records_from_rows(rows: &[RawRow]) -> TabularResult<Vec<FlatRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let id = trimmed(row, "id");
        if id.is_empty() {
            tracing::warn!(row = row_number, "row without id skipped");
            continue;
        }
        let kind: EntityKind = trimmed(row, "kind")
            .parse()
            .map_err(|source| TabularError::Kind {
                row: row_number,
                source,
            })?;

        let endpoints = match (trimmed(row, "source"), trimmed(row, "target")) {
            ("", "") => None,
            (source, target) if !source.is_empty() && !target.is_empty() => {
                Some(Endpoints::new(source, target))
            }
            _ => {
                return Err(TabularError::PartialEndpoints {
                    row: row_number,
                    id: id.to_string(),
                });
            }
        };

        let fields = row
            .iter()
            .filter(|(name, _)| !RESERVED_COLUMNS.contains(&name.as_str()))
            .map(|(name, cell)| (name.clone(), cell_value(cell)))
            .collect();

        records.push(FlatRecord {
            id: id.to_string(),
            kind,
            endpoints,
            fields,
        });
    }
    Ok(records)
}

fn cell_value(cell: &str) -> FieldValue {
    match cell {
        "" => FieldValue::Missing,
        CLEAR_MARKER => FieldValue::Clear,
        text if looks_like_marker(text) => FieldValue::text(&text[1..]),
        text => FieldValue::text(text),
    }
}

fn text_cell(text: &str) -> Cow<'_, str> {
    if looks_like_marker(text) {
        Cow::Owned(format!("#{text}"))
    } else {
        Cow::Borrowed(text)
    }
}

/// One or more `#` followed by `CLEAR`.
fn looks_like_marker(text: &str) -> bool {
    let marker = &CLEAR_MARKER[1..];
    text.strip_suffix(marker)
        .is_some_and(|hashes| !hashes.is_empty() && hashes.bytes().all(|b| b == b'#'))
}

fn trimmed<'r>(row: &'r RawRow, column: &str) -> &'r str {
    row.get(column).map_or("", |cell| cell.trim())
}

/// Field names across all records, first-seen order.
fn field_columns(records: &[FlatRecord]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for name in record.fields.keys() {
            if !columns.contains(&name.as_str()) {
                columns.push(name);
            }
        }
    }
    columns
}

fn next_record(
    lines: &mut impl Iterator<Item = Result<csv::StringRecord, csv::Error>>,
) -> TabularResult<csv::StringRecord> {
    match lines.next() {
        Some(record) => Ok(record?),
        None => Err(TabularError::Empty),
    }
}
