//! Structured-Document Emitter: pure function, extracted fields + kind →
//! normalized XML payload, for accounting kinds only. The exact schema (ISDOC or otherwise) is out of scope;
//! this emits a stable, well-formed superset carrying the 31-field contract
//! so any downstream ISDOC-shaped consumer can map fields by name.

use std::collections::BTreeMap;

use pipeline_types::DocumentKind;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("kind {0} does not emit a structured document")]
    NotStructured(DocumentKind),

    #[error("xml encoding error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("utf-8 error building xml: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Renders a document's fields as XML. Only kinds where
/// [`DocumentKind::emits_structured_document`] is true may be emitted;
/// callers (Phase 1) are expected to have already checked this.
pub fn emit_xml(doc_kind: DocumentKind, fields: &BTreeMap<String, Value>) -> Result<String, EmitError> {
    if !doc_kind.emits_structured_document() {
        return Err(EmitError::NotStructured(doc_kind));
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new("Document");
    root.push_attribute(("kind", doc_kind.to_string().as_str()));
    writer.write_event(Event::Start(root))?;

    for (name, value) in fields {
        write_field(&mut writer, name, value)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Document")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_field(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), EmitError> {
    let tag = xml_tag_name(name);
    writer.write_event(Event::Start(BytesStart::new(tag.as_str())))?;
    if let Some(text) = scalar_text(value) {
        writer.write_event(Event::Text(BytesText::new(&text)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}

/// `line_items_text` etc. stay `snake_case`-derived but PascalCase, matching
/// the element-naming convention accounting XML schemas use.
fn xml_tag_name(field_name: &str) -> String {
    field_name
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
