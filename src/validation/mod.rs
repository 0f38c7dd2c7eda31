//! Argument validation for dispatched operations.
//!
//! Each function extracts one typed value from the raw MCP argument map and
//! fails with a [`ValidationError`] naming the offending field. Validation runs
//! before any cache lookup or upstream call, so these functions are pure and cheap.

use crate::cache::keys;
use crate::config_xml;
use crate::error::{ValidationError, ValidationResult};
use serde_json::{Map, Value};

/// Raw argument map as received from the client.
pub type Args = Map<String, Value>;

/// Absent and explicit `null` are both treated as missing.
fn present<'a>(args: &'a Args, field: &str) -> Option<&'a Value> {
    args.get(field).filter(|v| !v.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A non-empty string identifier, trimmed.
pub fn required_str(args: &Args, field: &str) -> ValidationResult<String> {
    let value = present(args, field)
        .ok_or_else(|| ValidationError::new(field, "missing required argument"))?;
    string_value(field, value)
}

/// Like [`required_str`], but absent or `null` yields `None`.
pub fn optional_str(args: &Args, field: &str) -> ValidationResult<Option<String>> {
    present(args, field)
        .map(|value| string_value(field, value))
        .transpose()
}

/// A job name in canonical form, folder separators collapsed.
pub fn job_name(args: &Args, field: &str) -> ValidationResult<String> {
    let name = keys::job_id(&required_str(args, field)?);
    if name.is_empty() {
        return Err(ValidationError::new(field, "must name a job, got only '/'"));
    }
    Ok(name)
}

fn string_value(field: &str, value: &Value) -> ValidationResult<String> {
    let s = value.as_str().ok_or_else(|| {
        ValidationError::new(field, format!("must be a string, got {}", type_name(value)))
    })?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            field,
            "cannot be empty or whitespace only",
        ));
    }
    Ok(trimmed.to_string())
}

fn integer_value(field: &str, value: &Value) -> ValidationResult<i64> {
    value.as_i64().ok_or_else(|| {
        let reason = match value {
            Value::Number(_) => "must be an integer".to_string(),
            other => format!("must be an integer, got {}", type_name(other)),
        };
        ValidationError::new(field, reason)
    })
}

/// An integer within `min..=max`.
pub fn required_int(args: &Args, field: &str, min: i64, max: i64) -> ValidationResult<i64> {
    let value = present(args, field)
        .ok_or_else(|| ValidationError::new(field, "missing required argument"))?;
    let n = integer_value(field, value)?;
    if n < min || n > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {} and {}, got {}", min, max, n),
        ));
    }
    Ok(n)
}

/// A build number: a non-negative integer.
pub fn build_number(args: &Args, field: &str) -> ValidationResult<u64> {
    required_int(args, field, 0, i64::MAX).map(|n| n as u64)
}

/// An optional integer tuning knob. Absent yields `default`; out-of-range values
/// are clamped into `min..=max`; non-integers are rejected.
pub fn optional_clamped_int(
    args: &Args,
    field: &str,
    default: i64,
    min: i64,
    max: i64,
) -> ValidationResult<i64> {
    match present(args, field) {
        None => Ok(default.clamp(min, max)),
        Some(value) => Ok(integer_value(field, value)?.clamp(min, max)),
    }
}

/// A boolean flag. Accepts JSON booleans and the strings true/false/1/0/yes/no.
pub fn optional_bool(args: &Args, field: &str, default: bool) -> ValidationResult<bool> {
    match present(args, field) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ValidationError::new(
                field,
                format!("must be a boolean, got '{}'", other),
            )),
        },
        Some(other) => Err(ValidationError::new(
            field,
            format!("must be a boolean, got {}", type_name(other)),
        )),
    }
}

/// An XML document. Trimmed, must start with `<` and be well-formed.
pub fn required_xml(args: &Args, field: &str) -> ValidationResult<String> {
    let xml = required_str(args, field)?;
    if !xml.starts_with('<') {
        return Err(ValidationError::new(field, "must be valid XML starting with '<'"));
    }
    config_xml::check_well_formed(&xml).map_err(|reason| ValidationError::new(field, reason))?;
    Ok(xml)
}

/// A JSON object.
pub fn required_object(args: &Args, field: &str) -> ValidationResult<Map<String, Value>> {
    let value = present(args, field)
        .ok_or_else(|| ValidationError::new(field, "missing required argument"))?;
    object_value(field, value)
}

/// Like [`required_object`], but absent or `null` yields `None`.
pub fn optional_object(args: &Args, field: &str) -> ValidationResult<Option<Map<String, Value>>> {
    present(args, field)
        .map(|value| object_value(field, value))
        .transpose()
}

fn object_value(field: &str, value: &Value) -> ValidationResult<Map<String, Value>> {
    value.as_object().cloned().ok_or_else(|| {
        ValidationError::new(
            field,
            format!("must be an object, got {}", type_name(value)),
        )
    })
}

/// An XML element name (e.g. the root tag of a generated config).
pub fn element_name(args: &Args, field: &str, default: &str) -> ValidationResult<String> {
    let name = optional_str(args, field)?.unwrap_or_else(|| default.to_string());
    if !config_xml::is_valid_element_name(&name) {
        return Err(ValidationError::new(
            field,
            format!("'{}' is not a valid XML element name", name),
        ));
    }
    Ok(name)
}
