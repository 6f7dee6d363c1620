//! JSON authoring format for mapping specs.
//!
//! ```json
//! {
//!   "price": "items.price",
//!   "platform": {"$literal": "BigCommerce"},
//!   "all_items": {"$merge": {"roots": ["line_items.physical_items", "line_items.digital_items"], "search": "sku"}},
//!   "discounts": {"$each": {"source": "items.discounts", "template": {"amount": "discounted_amount"}}},
//!   "city": {"$coalesce": {"paths": ["billing.city", "shipping.city"], "default": ""}},
//!   "total": {"$call": "order_total"}
//! }
//! ```
//!
//! Strings are paths, other scalars are literals, arrays are sequences and
//! plain objects are nested maps. Objects whose keys start with `$` are
//! directives and must contain exactly one key.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::deferred::CallableRegistry;
use crate::path::DocPath;
use crate::spec::MappingSpec;
use crate::utils::{child_location, index_location, MappingError, Result};

const DIRECTIVE_PREFIX: char = '$';

/// Build a spec from its JSON form. `$call` names are looked up in `registry`.
pub fn spec_from_value(value: &Value, registry: &CallableRegistry) -> Result<MappingSpec> {
    let spec = parse_node(value, registry, "")?;
    spec.validate()?;
    Ok(spec)
}

/// Parse a JSON string into a spec.
pub fn spec_from_str(source: &str, registry: &CallableRegistry) -> Result<MappingSpec> {
    let value: Value = serde_json::from_str(source).map_err(|e| MappingError::SpecFile {
        path: "<string>".to_string(),
        message: e.to_string(),
    })?;
    spec_from_value(&value, registry)
}

/// Read and parse a spec file.
pub fn load_spec_file(path: &Path, registry: &CallableRegistry) -> Result<MappingSpec> {
    let shown = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|e| MappingError::SpecFile {
        path: shown.clone(),
        message: e.to_string(),
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| MappingError::SpecFile {
        path: shown.clone(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "loaded mapping spec");
    spec_from_value(&value, registry)
}

fn parse_node(value: &Value, registry: &CallableRegistry, location: &str) -> Result<MappingSpec> {
    match value {
        Value::String(path) => Ok(MappingSpec::Path(DocPath::new(path))),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(MappingSpec::Literal(value.clone())),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_node(item, registry, &index_location(location, i)))
            .collect::<Result<Vec<_>>>()
            .map(MappingSpec::Sequence),
        Value::Object(fields) => {
            let directives = fields.keys().filter(|k| k.starts_with(DIRECTIVE_PREFIX)).count();
            match directives {
                0 => parse_map(fields, registry, location),
                _ if fields.len() > 1 => Err(MappingError::malformed(
                    location,
                    "a directive object must contain exactly one key",
                )),
                _ => {
                    let (name, body) = fields.iter().next().ok_or_else(|| MappingError::malformed(location, "empty directive"))?;
                    parse_directive(name, body, registry, location)
                }
            }
        }
    }
}

fn parse_map(fields: &Map<String, Value>, registry: &CallableRegistry, location: &str) -> Result<MappingSpec> {
    let mut map = IndexMap::with_capacity(fields.len());
    for (name, node) in fields {
        map.insert(name.clone(), parse_node(node, registry, &child_location(location, name))?);
    }
    Ok(MappingSpec::Map(map))
}

fn parse_directive(name: &str, body: &Value, registry: &CallableRegistry, location: &str) -> Result<MappingSpec> {
    match name {
        "$literal" => Ok(MappingSpec::Literal(body.clone())),
        "$merge" => {
            let roots = string_list(field(body, "roots", name, location)?, "roots", location)?;
            let search = match body.get("search") {
                None => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(_) => return Err(MappingError::malformed(location, "$merge search must be a string")),
            };
            Ok(MappingSpec::merge(roots, &search))
        }
        "$each" => {
            let source = parse_node(field(body, "source", name, location)?, registry, location)?;
            let template = parse_node(
                field(body, "template", name, location)?,
                registry,
                &format!("{}[*]", location),
            )?;
            Ok(MappingSpec::each_of(source, template))
        }
        "$coalesce" => {
            let paths = string_list(field(body, "paths", name, location)?, "paths", location)?;
            Ok(MappingSpec::coalesce(paths, body.get("default").cloned()))
        }
        "$call" => {
            let callable = body
                .as_str()
                .ok_or_else(|| MappingError::malformed(location, "$call takes the name of a registered callable"))?;
            registry
                .get(callable)
                .cloned()
                .map(MappingSpec::Computed)
                .ok_or_else(|| MappingError::malformed(location, format!("unknown callable {:?}", callable)))
        }
        other => Err(MappingError::malformed(location, format!("unknown directive {:?}", other))),
    }
}

fn field<'v>(body: &'v Value, key: &str, directive: &str, location: &str) -> Result<&'v Value> {
    body.get(key)
        .ok_or_else(|| MappingError::malformed(location, format!("{} requires {:?}", directive, key)))
}

fn string_list(value: &Value, what: &str, location: &str) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| MappingError::malformed(location, format!("{} must be an array of path strings", what)))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                MappingError::malformed(location, format!("{} must be an array of path strings, found {}", what, item))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolve;
    use serde_json::json;

    fn no_callables() -> CallableRegistry {
        CallableRegistry::new()
    }

    #[test]
    fn test_plain_shapes() {
        let spec = spec_from_value(
            &json!({"price": "items.price", "flag": true, "rate": 0.05, "pair": ["a", "b"]}),
            &no_callables(),
        )
        .unwrap();
        let doc = json!({"items": {"price": 7}, "a": 1, "b": 2});
        assert_eq!(
            resolve(&spec, &doc).unwrap().into_value(),
            json!({"price": 7, "flag": true, "rate": 0.05, "pair": [1, 2]})
        );
    }

    #[test]
    fn test_directives() {
        let registry = CallableRegistry::new().with("two", |_| Ok(json!(2)));
        let spec = spec_from_value(
            &json!({
                "hash": {"$literal": "self.store.hash"},
                "all": {"$merge": {"roots": ["items", "items2"], "search": "identical"}},
                "each": {"$each": {"source": "items.nested", "template": {"v": "list_val"}}},
                "city": {"$coalesce": {"paths": ["missing", "items.city"], "default": ""}},
                "two": {"$call": "two"}
            }),
            &registry,
        )
        .unwrap();
        let doc = json!({
            "items": {"identical": "x", "nested": [{"list_val": 1}, {"list_val": 2}]},
            "items2": {"identical": "y"}
        });
        assert_eq!(
            resolve(&spec, &doc).unwrap().into_value(),
            json!({
                "hash": "self.store.hash",
                "all": ["x", "y"],
                "each": [{"v": 1}, {"v": 2}],
                "city": "",
                "two": 2
            })
        );
    }

    #[test]
    fn test_merge_without_search() {
        let spec = spec_from_value(&json!({"$merge": {"roots": ["a", "b"]}}), &no_callables()).unwrap();
        let doc = json!({"a": [1], "b": [2, 3]});
        assert_eq!(resolve(&spec, &doc).unwrap().into_value(), json!([1, 2, 3]));
    }

    #[test]
    fn test_malformed_merge_roots() {
        for body in [json!({"roots": "items"}), json!({"roots": [1, 2]}), json!({"search": "x"})] {
            let err = spec_from_value(&json!({"f": {"$merge": body}}), &no_callables()).unwrap_err();
            assert!(matches!(err, MappingError::MalformedSpec { ref location, .. } if location == "f"), "{:?}", err);
        }
    }

    #[test]
    fn test_mixed_directive_keys_rejected() {
        let err = spec_from_value(&json!({"$literal": 1, "other": "a"}), &no_callables()).unwrap_err();
        assert!(err.to_string().contains("exactly one key"));
    }

    #[test]
    fn test_unknown_directive_and_callable() {
        assert!(spec_from_value(&json!({"$flatten": []}), &no_callables()).is_err());
        let err = spec_from_value(&json!({"total": {"$call": "nope"}}), &no_callables()).unwrap_err();
        assert!(err.to_string().contains("unknown callable \"nope\""));
    }

    #[test]
    fn test_invalid_path_rejected_at_load() {
        let err = spec_from_value(&json!({"a": "x..y"}), &no_callables()).unwrap_err();
        assert!(matches!(err, MappingError::InvalidPath { .. }));
    }

    #[test]
    fn test_from_str_parse_error() {
        let err = spec_from_str("{not json", &no_callables()).unwrap_err();
        assert!(matches!(err, MappingError::SpecFile { .. }));
    }
}
