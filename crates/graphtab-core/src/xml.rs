// crates/graphtab-core/src/xml.rs
//
// quick-xml 0.38 reader/writer between XML text and `TreeValue`.
// - Root: a field map with one entry, root element name -> element value
// - Element with attributes or children: field map with `$` (attributes),
//   `_` (text) and one list per child element name, in document order
// - Element with neither: a leaf holding its text ("" for `<x/>`)
// - Qualified names are kept verbatim (`y:ShapeNode`); xmlns is an attribute
//
// Text policy:
// - A text run is everything between two markup events (text, CDATA,
//   entity and character references)
// - Whitespace-only runs are indentation and are dropped, unless the element
//   has no child elements and no other text (`<y:NodeLabel> </y:NodeLabel>`)
// - Any other run is kept exactly as written
// - Comments, processing instructions and DOCTYPE are not carried over

use crate::tree::{ATTRIBUTES_KEY, FieldMap, TEXT_KEY, TreeValue};
use indexmap::IndexMap;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::str;

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("utf8 error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown entity reference &{0};")]
    UnknownEntity(String),

    #[error("unexpected structure: {0}")]
    Structure(String),
}

pub type XmlResult<T> = Result<T, XmlError>;

struct OpenElement {
    name: String,
    attributes: FieldMap,
    text: String,
    blank: String,
    children: IndexMap<String, Vec<TreeValue>>,
}

impl OpenElement {
    fn new(e: &BytesStart<'_>) -> XmlResult<Self> {
        Ok(OpenElement {
            name: local_name_start(e)?,
            attributes: attrs_to_map(e)?,
            text: String::new(),
            blank: String::new(),
            children: IndexMap::new(),
        })
    }

    fn add_child(&mut self, name: String, value: TreeValue) -> XmlResult<()> {
        if name == ATTRIBUTES_KEY || name == TEXT_KEY {
            return Err(XmlError::Structure(format!(
                "element <{name}> collides with a reserved tree key"
            )));
        }
        self.children.entry(name).or_default().push(value);
        Ok(())
    }

    fn into_value(mut self) -> (String, TreeValue) {
        if self.text.is_empty() && self.children.is_empty() {
            self.text = self.blank;
        }
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, TreeValue::Leaf(self.text));
        }
        let mut fields = FieldMap::new();
        if !self.attributes.is_empty() {
            fields.insert(ATTRIBUTES_KEY.to_string(), TreeValue::Map(self.attributes));
        }
        if !self.text.is_empty() {
            fields.insert(TEXT_KEY.to_string(), TreeValue::Leaf(self.text));
        }
        for (name, items) in self.children {
            fields.insert(name, TreeValue::List(items));
        }
        (self.name, TreeValue::Map(fields))
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<OpenElement>,
    root: Option<(String, TreeValue)>,
    pending_text: String,
}

impl TreeBuilder {
    fn flush_text(&mut self) {
        if let Some(open) = self.stack.last_mut() {
            if self.pending_text.trim().is_empty() {
                open.blank.push_str(&self.pending_text);
            } else {
                open.text.push_str(&self.pending_text);
            }
        }
        self.pending_text.clear();
    }

    fn close(&mut self, element: OpenElement) -> XmlResult<()> {
        let (name, value) = element.into_value();
        match self.stack.last_mut() {
            Some(parent) => parent.add_child(name, value),
            None if self.root.is_some() => Err(XmlError::Structure(format!(
                "second root element <{name}>"
            ))),
            None => {
                self.root = Some((name, value));
                Ok(())
            }
        }
    }
}

/// Parse XML text into a tree rooted at a one-entry field map.
pub fn parse_tree(xml: &str) -> XmlResult<TreeValue> {
    let mut reader = Reader::from_str(xml.strip_prefix('\u{feff}').unwrap_or(xml));
    // IMPORTANT: no global trim_text; whitespace-only runs are dropped in flush_text.

    let mut buf = Vec::new();
    let mut builder = TreeBuilder::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                builder.flush_text();
                builder.stack.push(OpenElement::new(&e)?);
            }

            Event::Empty(e) => {
                builder.flush_text();
                let element = OpenElement::new(&e)?;
                builder.close(element)?;
            }

            Event::End(e) => {
                builder.flush_text();
                let name = local_name_end(&e)?;
                let element = builder.stack.pop().ok_or_else(|| {
                    XmlError::Structure(format!("closing </{name}> but no element is open"))
                })?;
                if element.name != name {
                    return Err(XmlError::Structure(format!(
                        "closing </{name}> does not match <{}>",
                        element.name
                    )));
                }
                builder.close(element)?;
            }

            Event::Text(t) => {
                builder.pending_text.push_str(&t.decode()?);
            }

            Event::CData(c) => {
                builder.pending_text.push_str(&c.decode()?);
            }

            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref()? {
                    builder.pending_text.push(ch);
                } else {
                    let name = r.decode()?;
                    let resolved = resolve_predefined_entity(&name)
                        .ok_or_else(|| XmlError::UnknownEntity(name.to_string()))?;
                    builder.pending_text.push_str(resolved);
                }
            }

            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = builder.stack.last() {
        return Err(XmlError::Structure(format!("<{}> is never closed", open.name)));
    }
    let (name, value) = builder
        .root
        .ok_or_else(|| XmlError::Structure("no root element found".into()))?;

    let mut root = FieldMap::new();
    root.insert(name, value);
    Ok(TreeValue::Map(root))
}

/// Serialize a tree produced by `parse_tree` (possibly edited) back to XML.
///
/// Child elements are written grouped by name in field-map order.
pub fn serialize_tree(tree: &TreeValue) -> XmlResult<String> {
    let root = tree
        .as_map()
        .filter(|fields| fields.len() == 1)
        .ok_or_else(|| {
            XmlError::Structure("root must be a field map with exactly one element".into())
        })?;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    for (name, value) in root {
        write_element(&mut writer, name, value)?;
    }

    let mut out = String::from_utf8(writer.into_inner())?;
    out.push('\n');
    Ok(out)
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &TreeValue) -> XmlResult<()> {
    match value {
        TreeValue::Leaf(text) if text.is_empty() => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        TreeValue::Leaf(text) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        TreeValue::List(_) => {
            return Err(XmlError::Structure(format!(
                "<{name}> is a list; element values must be a leaf or a field map"
            )));
        }
        TreeValue::Map(fields) => {
            let mut start = BytesStart::new(name);
            if let Some(attributes) = fields.get(ATTRIBUTES_KEY) {
                let attributes = attributes.as_map().ok_or_else(|| {
                    XmlError::Structure(format!("<{name}> attributes must be a field map"))
                })?;
                for (key, attr) in attributes {
                    let attr = attr.as_leaf().ok_or_else(|| {
                        XmlError::Structure(format!("<{name}> attribute {key} must be a leaf"))
                    })?;
                    start.push_attribute((key.as_str(), attr));
                }
            }

            let text = match fields.get(TEXT_KEY) {
                Some(TreeValue::Leaf(text)) => Some(text.as_str()).filter(|t| !t.is_empty()),
                Some(_) => {
                    return Err(XmlError::Structure(format!("<{name}> text must be a leaf")));
                }
                None => None,
            };
            let mut children = fields
                .iter()
                .filter(|(key, _)| key.as_str() != ATTRIBUTES_KEY && key.as_str() != TEXT_KEY)
                .peekable();

            if text.is_none() && children.peek().is_none() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            writer.write_event(Event::Start(start))?;
            if let Some(text) = text {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            for (child_name, child) in children {
                match child {
                    TreeValue::List(items) => {
                        for item in items {
                            write_element(writer, child_name, item)?;
                        }
                    }
                    single => write_element(writer, child_name, single)?,
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}

fn attrs_to_map(e: &BytesStart<'_>) -> XmlResult<FieldMap> {
    let mut out = FieldMap::new();
    for a in e.attributes() {
        let a = a?;
        let key = str::from_utf8(a.key.as_ref())?.to_string();
        let val = a.unescape_value()?.to_string();
        out.insert(key, TreeValue::Leaf(val));
    }
    Ok(out)
}

fn local_name_start(e: &BytesStart<'_>) -> XmlResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}

fn local_name_end(e: &BytesEnd<'_>) -> XmlResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}
