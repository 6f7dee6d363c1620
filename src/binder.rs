//! Binding resolved mappings into typed output models.
//!
//! The binder walks the resolved value alongside the target's JSON Schema,
//! substitutes declared defaults for absent fields (and for explicit `null`
//! when `nones_to_default` is on), applies lax scalar coercion if enabled,
//! and collects every violation before giving up. Only a fully conforming
//! value is handed to serde.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{Coercion, MapperConfig};
use crate::resolved::Resolved;
use crate::schema::OutputSchema;
use crate::utils::{child_location, coerce_scalar, display_location, index_location, kind_of};

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted/indexed location, empty for the model itself.
    pub field: String,
    pub reason: String,
}

/// Every field that failed to bind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[mapped] {} field(s) failed validation: {}", .violations.len(), summarize(.violations))]
pub struct BindError {
    pub violations: Vec<FieldViolation>,
}

impl BindError {
    pub(crate) fn single(field: &str, reason: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.to_string(),
                reason: reason.into(),
            }],
        }
    }

    /// Reasons reported for `field`.
    pub fn reasons_for(&self, field: &str) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.field == field)
            .map(|v| v.reason.as_str())
            .collect()
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", display_location(&v.field), v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bind a resolved mapping into `T`.
pub fn bind<T>(resolved: &Resolved, config: &MapperConfig) -> Result<T, BindError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = OutputSchema::of::<T>();
    let value = bind_value(resolved, &schema, config)?;
    serde_json::from_value(value).map_err(|e| BindError::single("", e.to_string()))
}

/// Conform a resolved mapping to `schema`, returning the plain JSON that a
/// type with that schema would deserialize from.
pub fn bind_value(resolved: &Resolved, schema: &OutputSchema, config: &MapperConfig) -> Result<Value, BindError> {
    let mut conformer = Conformer::new(schema, config);
    let out = match resolved.to_bind_input() {
        Some(value) => conformer.conform(schema.as_value(), &value, ""),
        None => conformer.reject("", "nothing was resolved"),
    };
    conformer.finish(out)
}

/// Check an already-built value against `schema` without keeping the result.
pub fn check_value(value: &Value, schema: &OutputSchema, config: &MapperConfig) -> Result<(), BindError> {
    let mut conformer = Conformer::new(schema, config);
    let out = conformer.conform(schema.as_value(), value, "");
    conformer.finish(out).map(|_| ())
}

struct Conformer<'a> {
    schema: &'a OutputSchema,
    config: &'a MapperConfig,
    violations: Vec<FieldViolation>,
}

impl<'a> Conformer<'a> {
    fn new(schema: &'a OutputSchema, config: &'a MapperConfig) -> Self {
        Self {
            schema,
            config,
            violations: Vec::new(),
        }
    }

    fn fork(&self) -> Conformer<'a> {
        Conformer::new(self.schema, self.config)
    }

    fn finish(self, out: Option<Value>) -> Result<Value, BindError> {
        match out {
            Some(value) if self.violations.is_empty() => Ok(value),
            _ if self.violations.is_empty() => Err(BindError::single("", "value was rejected")),
            _ => Err(BindError {
                violations: self.violations,
            }),
        }
    }

    fn reject(&mut self, field: &str, reason: impl Into<String>) -> Option<Value> {
        self.violations.push(FieldViolation {
            field: field.to_string(),
            reason: reason.into(),
        });
        None
    }

    fn conform(&mut self, node: &Value, value: &Value, field: &str) -> Option<Value> {
        let schema = self.schema;
        let rules = match schema.follow_ref(node) {
            Value::Bool(true) => return Some(value.clone()),
            Value::Bool(false) => return self.reject(field, "no value is allowed here"),
            Value::Object(rules) => rules,
            _ => return Some(value.clone()),
        };

        let mut value = value.clone();
        if let Some(all) = rules.get("allOf").and_then(Value::as_array) {
            for sub in all {
                value = self.conform(sub, &value, field)?;
            }
        }
        for key in ["anyOf", "oneOf"] {
            if let Some(options) = rules.get(key).and_then(Value::as_array) {
                value = self.conform_any(options, &value, field)?;
            }
        }

        let types = instance_types(rules);
        if !types.is_empty() {
            value = self.conform_type(&types, value, field)?;
        }

        if let Some(allowed) = rules.get("enum").and_then(Value::as_array) {
            if !allowed.contains(&value) {
                return self.reject(field, format!("{} is not one of the allowed values", value));
            }
        }
        if let Some(expected) = rules.get("const") {
            if *expected != value {
                return self.reject(field, format!("expected constant {}, found {}", expected, value));
            }
        }
        if let (Some(min), Some(n)) = (rules.get("minimum").and_then(Value::as_f64), value.as_f64()) {
            if n < min {
                return self.reject(field, format!("{} is below the minimum {}", n, min));
            }
        }
        if let (Some(max), Some(n)) = (rules.get("maximum").and_then(Value::as_f64), value.as_f64()) {
            if n > max {
                return self.reject(field, format!("{} is above the maximum {}", n, max));
            }
        }

        if let Value::Object(fields) = &value {
            if rules.contains_key("properties") || rules.contains_key("additionalProperties") {
                return self.conform_object(rules, fields, field);
            }
        }
        if let Value::Array(items) = &value {
            if rules.contains_key("items") {
                return self.conform_items(rules, items, field);
            }
        }
        Some(value)
    }

    fn conform_any(&mut self, options: &[Value], value: &Value, field: &str) -> Option<Value> {
        let mut reasons = Vec::new();
        for option in options {
            let mut trial = self.fork();
            match trial.conform(option, value, field) {
                Some(conformed) if trial.violations.is_empty() => return Some(conformed),
                _ => reasons.extend(trial.violations.into_iter().map(|v| v.reason)),
            }
        }
        self.reject(
            field,
            format!("does not match any allowed shape ({})", reasons.join("; ")),
        )
    }

    fn conform_type(&mut self, types: &[&str], value: Value, field: &str) -> Option<Value> {
        if types.iter().any(|t| type_matches(t, &value)) {
            return Some(value);
        }
        if self.config.coercion == Coercion::Lax {
            if let Some(coerced) = types.iter().find_map(|t| coerce_scalar(t, &value)) {
                return Some(coerced);
            }
        }
        self.reject(
            field,
            format!("expected {}, found {}", types.join(" or "), kind_of(&value)),
        )
    }

    fn conform_object(&mut self, rules: &Map<String, Value>, fields: &Map<String, Value>, field: &str) -> Option<Value> {
        let before = self.violations.len();
        let empty = Map::new();
        let properties = rules.get("properties").and_then(Value::as_object).unwrap_or(&empty);
        let required: Vec<&str> = rules
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut out = Map::new();
        for (name, prop) in properties {
            let child = child_location(field, name);
            let default = prop.get("default");
            match (fields.get(name), default) {
                (None, Some(default)) => {
                    out.insert(name.clone(), default.clone());
                }
                (None, None) => {
                    if required.contains(&name.as_str()) {
                        self.reject(&child, "missing required field");
                    }
                }
                (Some(Value::Null), Some(default)) if self.config.nones_to_default => {
                    out.insert(name.clone(), default.clone());
                }
                (Some(value), _) => {
                    if let Some(conformed) = self.conform(prop, value, &child) {
                        out.insert(name.clone(), conformed);
                    }
                }
            }
        }

        for (name, value) in fields {
            if properties.contains_key(name) {
                continue;
            }
            let child = child_location(field, name);
            match rules.get("additionalProperties") {
                Some(Value::Bool(false)) => {
                    self.reject(&child, "unexpected field");
                }
                Some(extra @ Value::Object(_)) => {
                    if let Some(conformed) = self.conform(extra, value, &child) {
                        out.insert(name.clone(), conformed);
                    }
                }
                _ => {
                    out.insert(name.clone(), value.clone());
                }
            }
        }

        if self.violations.len() > before {
            None
        } else {
            Some(Value::Object(out))
        }
    }

    fn conform_items(&mut self, rules: &Map<String, Value>, items: &[Value], field: &str) -> Option<Value> {
        let before = self.violations.len();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let node = match rules.get("items") {
                Some(Value::Array(positional)) => positional.get(i),
                other => other,
            };
            match node {
                Some(node) => {
                    if let Some(conformed) = self.conform(node, item, &index_location(field, i)) {
                        out.push(conformed);
                    }
                }
                None => out.push(item.clone()),
            }
        }
        if self.violations.len() > before {
            None
        } else {
            Some(Value::Array(out))
        }
    }
}

fn instance_types(rules: &Map<String, Value>) -> Vec<&str> {
    match rules.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}
