//! Error types and scalar helpers shared by the resolver and the binder.

use serde_json::{Number, Value};
use thiserror::Error;

use crate::binder::BindError;
use crate::deferred::ComputeError;
use crate::path::SEPARATOR;

/// Result alias used throughout the crate.
pub type Result<T, E = MappingError> = std::result::Result<T, E>;

/// Everything that can go wrong while authoring, resolving, or binding a mapping.
///
/// A path with no match in the document is deliberately absent from this list:
/// it resolves to [`crate::Resolved::Absent`] instead.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("[mapped] invalid path {path:?} at {location}: {reason}")]
    InvalidPath {
        path: String,
        location: String,
        reason: String,
    },

    #[error("[mapped] malformed spec at {location}: {reason}")]
    MalformedSpec { location: String, reason: String },

    #[error("[mapped] computed value at {location} failed: {source}")]
    Computation {
        location: String,
        #[source]
        source: ComputeError,
    },

    #[error("[mapped] record has no {key:?} field to merge on")]
    MissingMergeKey { key: String },

    #[error("[mapped] failed to load spec file {path}: {message}")]
    SpecFile { path: String, message: String },

    #[error("[mapped] invalid config value {value:?} for {key}")]
    InvalidConfig { key: String, value: String },

    #[error("[mapped] source document could not be serialized: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    Bind(#[from] BindError),
}

impl MappingError {
    pub(crate) fn malformed(location: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            location: display_location(location),
            reason: reason.into(),
        }
    }
}

/// Render an empty location as `<root>`.
pub(crate) fn display_location(location: &str) -> String {
    if location.is_empty() {
        "<root>".to_string()
    } else {
        location.to_string()
    }
}

pub(crate) fn child_location(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

pub(crate) fn index_location(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

/// Output field names must be addressable by a path, so they may not be empty
/// or contain the path separator.
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR)
}

/// Coerce a string value to boolean.
/// "true", "1" → true; everything else → false.
pub fn coerce_boolean(value: &str) -> bool {
    parse_boolean(value).unwrap_or(false)
}

/// Strict boolean parse: "true"/"1" and "false"/"0" (case-insensitive), nothing else.
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Short name of a JSON value's kind, as used in validation messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lax scalar conversion toward a JSON Schema instance type.
///
/// Returns `None` when no lossless conversion exists.
pub fn coerce_scalar(target: &str, value: &Value) -> Option<Value> {
    match (target, value) {
        ("integer", Value::String(s)) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Some(Value::from(n));
            }
            trimmed.parse::<f64>().ok().and_then(whole_number)
        }
        ("integer", Value::Number(n)) => n.as_f64().and_then(whole_number),
        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        ("boolean", Value::String(s)) => parse_boolean(s).map(Value::Bool),
        ("boolean", Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn whole_number(n: f64) -> Option<Value> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        None
    }
}
