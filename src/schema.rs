//! Output model descriptors.
//!
//! Target types describe themselves with `schemars::JsonSchema`. Field
//! defaults are declared per field with `#[serde(default ...)]`, which
//! schemars records as `"default"` in the generated schema; the binder reads
//! them from there. Hand-written JSON Schemas are accepted too.

use std::collections::VecDeque;

use schemars::JsonSchema;
use serde_json::{Map, Value};

/// Upper bound on chained `$ref` hops, guarding against reference cycles.
const MAX_REF_DEPTH: usize = 32;

/// Keywords the binder enforces or deliberately ignores as annotations.
const UNDERSTOOD_KEYWORDS: &[&str] = &[
    // Enforced
    "type",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "enum",
    "const",
    "minimum",
    "maximum",
    "allOf",
    "anyOf",
    "oneOf",
    "$ref",
    "default",
    // Annotations
    "$schema",
    "$id",
    "title",
    "description",
    "format",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "definitions",
    "$defs",
];

/// A keyword present in a schema that the binder will not enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnenforcedKeyword {
    pub path: String,
    pub keyword: String,
}

/// One top-level field of an output model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub required: bool,
    pub default: Option<Value>,
}

/// JSON Schema of an output model, as consumed by the binder.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    root: Value,
}

impl OutputSchema {
    /// Derive the schema of `T`.
    pub fn of<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        let root = serde_json::to_value(&schema).unwrap_or_default();
        Self { root }
    }

    /// Use a hand-written JSON Schema. Keywords the binder does not enforce
    /// are logged and otherwise ignored.
    pub fn from_value(root: Value) -> Self {
        let schema = Self { root };
        for issue in schema.unenforced_keywords() {
            tracing::warn!(path = %issue.path, keyword = %issue.keyword, "schema keyword is not enforced by the binder");
        }
        schema
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn title(&self) -> Option<&str> {
        self.root.get("title").and_then(Value::as_str)
    }

    /// Top-level fields in declaration order.
    pub fn fields(&self) -> Vec<FieldInfo> {
        let root = self.follow_ref(&self.root);
        let required: Vec<&str> = root
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        root.get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| FieldInfo {
                        name: name.clone(),
                        required: required.contains(&name.as_str()),
                        default: prop.get("default").cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Follow `$ref` pointers into `definitions` / `$defs` until a concrete node is reached.
    pub(crate) fn follow_ref<'s>(&'s self, node: &'s Value) -> &'s Value {
        let mut current = node;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return current;
            };
            match self.definition(reference) {
                Some(target) => current = target,
                None => return current,
            }
        }
        current
    }

    fn definition(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }

    /// Keywords anywhere in the schema that the binder will not enforce,
    /// reported breadth-first with the JSON pointer of the owning node.
    pub fn unenforced_keywords(&self) -> Vec<UnenforcedKeyword> {
        let mut issues = Vec::new();
        let mut pending = VecDeque::from([(String::new(), &self.root)]);
        while let Some((pointer, node)) = pending.pop_front() {
            let Some(rules) = node.as_object() else {
                continue;
            };
            let shown = if pointer.is_empty() { "/" } else { pointer.as_str() };
            issues.extend(
                rules
                    .keys()
                    .filter(|keyword| !UNDERSTOOD_KEYWORDS.contains(&keyword.as_str()))
                    .map(|keyword| UnenforcedKeyword {
                        path: shown.to_string(),
                        keyword: keyword.clone(),
                    }),
            );
            pending.extend(
                subschemas(rules)
                    .into_iter()
                    .map(|(suffix, child)| (format!("{}{}", pointer, suffix), child)),
            );
        }
        issues
    }
}

/// Schemas nested directly under `rules`, paired with their pointer suffix.
fn subschemas(rules: &Map<String, Value>) -> Vec<(String, &Value)> {
    let mut children = Vec::new();
    for keyword in ["properties", "$defs", "definitions"] {
        if let Some(named) = rules.get(keyword).and_then(Value::as_object) {
            children.extend(named.iter().map(|(name, schema)| (format!("/{}/{}", keyword, name), schema)));
        }
    }
    for keyword in ["items", "additionalProperties", "allOf", "anyOf", "oneOf"] {
        match rules.get(keyword) {
            Some(Value::Array(listed)) => children.extend(
                listed
                    .iter()
                    .enumerate()
                    .map(|(i, schema)| (format!("/{}/{}", keyword, i), schema)),
            ),
            Some(schema) => children.push((format!("/{}", keyword), schema)),
            None => {}
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    fn default_platform() -> String {
        "BigCommerce".to_string()
    }

    #[derive(Serialize, Deserialize, JsonSchema)]
    struct Address {
        city: String,
        state: String,
    }

    #[derive(Serialize, Deserialize, JsonSchema)]
    struct Store {
        store_hash: String,
        store_id: Option<i64>,
        #[serde(default = "default_platform")]
        platform: String,
        address: Address,
    }

    #[test]
    fn test_derived_fields() {
        let schema = OutputSchema::of::<Store>();
        assert_eq!(schema.title(), Some("Store"));
        let fields = schema.fields();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["store_hash", "store_id", "platform", "address"]);

        let by_name = |n: &str| fields.iter().find(|f| f.name == n).unwrap().clone();
        assert!(by_name("store_hash").required);
        assert!(!by_name("store_id").required);
        assert!(!by_name("platform").required);
        assert_eq!(by_name("platform").default, Some(json!("BigCommerce")));
        assert!(by_name("address").required);
    }

    #[test]
    fn test_follow_ref_into_definitions() {
        let schema = OutputSchema::of::<Store>();
        let address = &schema.as_value()["properties"]["address"];
        let resolved = schema.follow_ref(address);
        assert!(resolved["properties"]["city"].is_object());
    }

    #[test]
    fn test_follow_ref_unknown_target_stays_put() {
        let schema = OutputSchema::from_value(json!({"type": "object"}));
        let node = json!({"$ref": "#/definitions/Nope"});
        assert_eq!(schema.follow_ref(&node), &node);
    }

    #[test]
    fn test_follow_ref_cycle_terminates() {
        let schema = OutputSchema::from_value(json!({
            "$defs": {"A": {"$ref": "#/$defs/B"}, "B": {"$ref": "#/$defs/A"}}
        }));
        let node = json!({"$ref": "#/$defs/A"});
        assert!(schema.follow_ref(&node).get("$ref").is_some());
    }

    #[test]
    fn test_derived_schema_is_fully_enforced() {
        assert!(OutputSchema::of::<Store>().unenforced_keywords().is_empty());
    }

    #[test]
    fn test_hand_written_schema_reports_unenforced() {
        let schema = OutputSchema::from_value(json!({
            "type": "object",
            "properties": {
                "sku": {"type": "string", "pattern": "^[0-9]+$"},
                "tags": {"type": "array", "items": {"type": "string", "maxLength": 8}}
            }
        }));
        let issues = schema.unenforced_keywords();
        assert_eq!(
            issues,
            vec![
                UnenforcedKeyword {
                    path: "/properties/sku".to_string(),
                    keyword: "pattern".to_string()
                },
                UnenforcedKeyword {
                    path: "/properties/tags/items".to_string(),
                    keyword: "maxLength".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unenforced_inside_combinators_and_tuples() {
        let schema = OutputSchema::from_value(json!({
            "anyOf": [{"type": "string", "minLength": 1}, {"type": "null"}],
            "items": [{"type": "integer", "multipleOf": 2}],
            "additionalProperties": false
        }));
        let found: Vec<(String, String)> = schema
            .unenforced_keywords()
            .into_iter()
            .map(|issue| (issue.path, issue.keyword))
            .collect();
        assert_eq!(
            found,
            vec![
                ("/items/0".to_string(), "multipleOf".to_string()),
                ("/anyOf/0".to_string(), "minLength".to_string()),
            ]
        );
    }

    #[test]
    fn test_fields_of_hand_written_schema() {
        let schema = OutputSchema::from_value(json!({
            "type": "object",
            "required": ["price"],
            "properties": {
                "price": {"type": "number"},
                "opts": {"type": ["number", "null"], "default": null}
            }
        }));
        assert_eq!(
            schema.fields(),
            vec![
                FieldInfo {
                    name: "price".to_string(),
                    required: true,
                    default: None
                },
                FieldInfo {
                    name: "opts".to_string(),
                    required: false,
                    default: Some(Value::Null)
                },
            ]
        );
    }
}
