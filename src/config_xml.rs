//! Job configuration XML helpers.
//!
//! Jenkins is authoritative for the meaning of a `config.xml`; these helpers only
//! check structure, generate XML from JSON objects, and rewrite self references
//! when a job is copied.

use once_cell::sync::Lazy;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use serde_json::{Map, Value};

static XML_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid XML name regex"));

/// Whether `name` can be used as an element name.
pub fn is_valid_element_name(name: &str) -> bool {
    XML_NAME.is_match(name) && !name.to_ascii_lowercase().starts_with("xml")
}

/// Check that `xml` is a single well-formed document.
///
/// Returns a human readable reason on failure.
pub fn check_well_formed(xml: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(xml);
    let mut depth: usize = 0;
    let mut roots: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "closing tag without matching opening tag".to_string())?;
            }
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML near position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }

    if depth != 0 {
        return Err(format!("{} element(s) left unclosed", depth));
    }
    match roots {
        0 => Err("document has no root element".to_string()),
        1 => Ok(()),
        n => Err(format!("document has {} root elements, expected 1", n)),
    }
}

/// Render a JSON object as a job configuration document.
///
/// Objects become nested elements, arrays become repeated `<item>` elements,
/// scalars become escaped text, and `null` becomes an empty element.
pub fn from_json(root_tag: &str, data: &Map<String, Value>) -> Result<String, String> {
    if !is_valid_element_name(root_tag) {
        return Err(format!("'{}' is not a valid XML element name", root_tag));
    }

    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root_tag, &Value::Object(data.clone()))?;
    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), String> {
    if !is_valid_element_name(name) {
        return Err(format!("'{}' is not a valid XML element name", name));
    }

    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| e.to_string())?;

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                write_element(writer, key, child)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                write_element(writer, "item", item)?;
            }
        }
        Value::Null => {}
        Value::String(s) => write_text(writer, s)?,
        other => write_text(writer, &other.to_string())?,
    }

    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<(), String> {
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| e.to_string())
}

/// Point `projectName`/`projectFullName` elements that name `old` at `new`.
pub fn rewrite_job_references(xml: &str, old: &str, new: &str) -> String {
    let mut output = xml.to_string();
    for tag in ["projectName", "projectFullName"] {
        let pattern = format!(
            r"<{tag}>\s*{}\s*</{tag}>",
            regex::escape(&escape_text(old)),
            tag = tag
        );
        if let Ok(re) = Regex::new(&pattern) {
            let replacement = format!("<{tag}>{}</{tag}>", escape_text(new), tag = tag);
            output = re
                .replace_all(&output, regex::NoExpand(&replacement))
                .into_owned();
        }
    }
    output
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
