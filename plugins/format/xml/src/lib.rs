//! XML adapter using the compact convention.
//!
//! Object members become elements, arrays become repeated sibling elements,
//! scalars become text. On the way back every element is an object: text
//! lands under `_text`, attributes under `_attributes`, CDATA under `_cdata`,
//! and repeated siblings collapse into an array.

use std::borrow::Cow;

use format_api::{DataFormat, FormatError, FormatSerializer, Value};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::trace;

const ATTRIBUTES_KEY: &str = "_attributes";
const TEXT_KEY: &str = "_text";
const CDATA_KEY: &str = "_cdata";
const COMMENT_KEY: &str = "_comment";

// ---- Config ----

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct XmlFormatConfig {
    /// Synthetic element wrapping the converter output.
    pub root_element: String,
    /// Spaces per nesting level. 0 writes everything on one line.
    pub indent: usize,
}

impl Default for XmlFormatConfig {
    fn default() -> Self {
        Self { root_element: "root".to_string(), indent: 2 }
    }
}

// ---- FormatSerializer ----

pub struct XmlFormatSerializer {
    config: XmlFormatConfig,
}

impl XmlFormatSerializer {
    pub fn new(config: XmlFormatConfig) -> Result<Self, FormatError> {
        if config.root_element.is_empty() {
            return Err(FormatError::config("xml: root_element must not be empty"));
        }
        Ok(Self { config })
    }
}

impl FormatSerializer for XmlFormatSerializer {
    fn deserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        xml_to_value(data).map_err(|e| e.with_context("xml deserialize"))
    }

    /// The root is wrapped around the converted members, not indented with
    /// them: children start at column 0 and sit on their own lines.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        let mut writer = if self.config.indent > 0 {
            Writer::new_with_indent(Vec::new(), b' ', self.config.indent)
        } else {
            Writer::new(Vec::new())
        };
        write_members(&mut writer, value).map_err(|e| e.with_context("xml serialize"))?;
        let inner = writer.into_inner();

        let root = self.config.root_element.as_str();
        let newline: &[u8] = if self.config.indent > 0 { b"\n" } else { b"" };
        let mut bytes = Vec::with_capacity(inner.len() + 2 * root.len() + 7);
        bytes.extend_from_slice(format!("<{root}>").as_bytes());
        bytes.extend_from_slice(newline);
        bytes.extend_from_slice(&inner);
        bytes.extend_from_slice(newline);
        bytes.extend_from_slice(format!("</{root}>").as_bytes());
        trace!(len = bytes.len(), root, "xml serialized");
        Ok(bytes)
    }

    fn format(&self) -> DataFormat {
        DataFormat::Xml
    }
}

fn xml_err(e: impl std::fmt::Display) -> FormatError {
    FormatError::format(e.to_string())
}

// ═══════════════════════════════════════════════════════════════
//  Value → XML
// ═══════════════════════════════════════════════════════════════

/// Emit the members of an object as sibling elements.
fn write_members(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<(), FormatError> {
    let Value::Object(fields) = value else {
        return Err(FormatError::format(format!("object expected, got {}", value.type_name())));
    };
    for (name, member) in fields {
        match name.as_str() {
            TEXT_KEY => write_text(writer, member)?,
            CDATA_KEY => {
                let text = scalar_text(member)?;
                writer.write_event(Event::CData(BytesCData::new(text.as_ref()))).map_err(xml_err)?;
            }
            COMMENT_KEY => {
                let text = scalar_text(member)?;
                writer
                    .write_event(Event::Comment(BytesText::from_escaped(text.as_ref())))
                    .map_err(xml_err)?;
            }
            // Consumed by the enclosing element.
            ATTRIBUTES_KEY => {}
            _ => match member {
                Value::Array(items) => {
                    for item in items {
                        write_element(writer, name, item)?;
                    }
                }
                other => write_element(writer, name, other)?,
            },
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), FormatError> {
    let mut start = BytesStart::new(name);
    if let Some(attrs) = value.get(ATTRIBUTES_KEY) {
        let Value::Object(attrs) = attrs else {
            return Err(FormatError::format(format!("{name}: {ATTRIBUTES_KEY} must be an object")));
        };
        for (key, attr) in attrs {
            let text = scalar_text(attr)?;
            start.push_attribute((key.as_str(), text.as_ref()));
        }
    }

    let empty = match value {
        Value::Null => true,
        Value::Object(fields) => fields.iter().all(|(k, _)| k == ATTRIBUTES_KEY),
        _ => false,
    };
    if empty {
        writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    match value {
        Value::Object(_) => write_members(writer, value).map_err(|e| e.with_context(name))?,
        Value::Array(_) => {
            return Err(FormatError::format(format!("{name}: nested arrays have no XML form")));
        }
        scalar => write_text(writer, scalar)?,
    }
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<(), FormatError> {
    let text = scalar_text(value)?;
    writer.write_event(Event::Text(BytesText::new(text.as_ref()))).map_err(xml_err)?;
    Ok(())
}

fn scalar_text(value: &Value) -> Result<Cow<'_, str>, FormatError> {
    Ok(match value {
        Value::Null => Cow::Borrowed(""),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Int64(i) => Cow::Owned(i.to_string()),
        Value::UInt64(u) => Cow::Owned(u.to_string()),
        Value::Float64(f) => Cow::Owned(f.to_string()),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => {
            return Err(FormatError::format(format!("scalar expected, got {}", other.type_name())));
        }
    })
}

// ═══════════════════════════════════════════════════════════════
//  XML → Value
// ═══════════════════════════════════════════════════════════════

/// An element still being read.
struct Frame {
    name: String,
    fields: Vec<(String, Value)>,
}

fn xml_to_value(data: &[u8]) -> Result<Value, FormatError> {
    let mut reader = Reader::from_reader(data);

    let mut stack = vec![Frame { name: String::new(), fields: Vec::new() }];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                stack.push(Frame { name, fields: read_attributes(e)? });
            }
            Ok(Event::Empty(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                let element = Value::Object(read_attributes(e)?);
                add_child(current(&mut stack)?, name, element);
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(FormatError::format("unexpected closing tag"));
                }
                if let Some(frame) = stack.pop() {
                    add_child(current(&mut stack)?, frame.name, Value::Object(frame.fields));
                }
            }
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(xml_err)?;
                // Indentation between elements.
                if !text.trim().is_empty() {
                    append_text(current(&mut stack)?, TEXT_KEY, &text);
                }
            }
            Ok(Event::CData(ref c)) => {
                let text = std::str::from_utf8(c.as_ref())?;
                append_text(current(&mut stack)?, CDATA_KEY, text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FormatError::format(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        let open = stack.last().map(|f| f.name.as_str()).unwrap_or_default();
        return Err(FormatError::format(format!("unclosed element <{open}>")));
    }
    let root = stack.pop().map(|f| f.fields).unwrap_or_default();
    if root.is_empty() {
        return Err(FormatError::format("no root element"));
    }
    Ok(Value::Object(root))
}

fn current(stack: &mut [Frame]) -> Result<&mut Vec<(String, Value)>, FormatError> {
    stack
        .last_mut()
        .map(|f| &mut f.fields)
        .ok_or_else(|| FormatError::format("element stack underflow"))
}

fn read_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, Value)>, FormatError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value().map_err(xml_err)?;
        attrs.push((key, Value::String(value.into_owned())));
    }
    if attrs.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![(ATTRIBUTES_KEY.to_string(), Value::Object(attrs))])
}

/// Repeated sibling names turn the member into an array.
fn add_child(fields: &mut Vec<(String, Value)>, name: String, child: Value) {
    match fields.iter_mut().find(|(k, _)| *k == name) {
        Some((_, Value::Array(items))) => items.push(child),
        Some((_, existing)) => {
            let first = std::mem::take(existing);
            *existing = Value::Array(vec![first, child]);
        }
        None => fields.push((name, child)),
    }
}

fn append_text(fields: &mut Vec<(String, Value)>, key: &str, text: &str) {
    match fields.iter_mut().find(|(k, _)| k == key) {
        Some((_, Value::String(existing))) => existing.push_str(text),
        _ => fields.push((key.to_string(), Value::String(text.to_string()))),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Normalization
// ═══════════════════════════════════════════════════════════════

/// Collapse compact-convention wrappers so a decoded document can be
/// compared with the value it was produced from.
///
/// `{"_text": s}` becomes `s`, empty elements become `""`, attributes are
/// dropped. Text stays text: numbers are not re-parsed.
pub fn flatten_text(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let members: Vec<&(String, Value)> =
                fields.iter().filter(|(k, _)| k != ATTRIBUTES_KEY).collect();
            match members.as_slice() {
                [] => Value::String(String::new()),
                [(k, v)] if k == TEXT_KEY || k == CDATA_KEY => v.clone(),
                _ => Value::Object(
                    members.iter().map(|(k, v)| (k.clone(), flatten_text(v))).collect(),
                ),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(flatten_text).collect()),
        scalar => scalar.clone(),
    }
}
