//! Computed (callable) values.
//!
//! A [`Computed`] leaf receives the document it is resolved against and
//! returns a derived value. Deferred fields registered on a
//! [`crate::Mapper`] are computed after the rest of the mapping is
//! resolved; they all see the pre-deferred snapshot (not each other's
//! results), which keeps the outcome independent of registration order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::path::{broadcast, DocPath};
use crate::resolved::Resolved;
use crate::utils::{child_location, MappingError, Result};

/// Failure raised by a computed value. Propagated to the caller untouched.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ComputeError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn wrap<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

type ComputeFn = dyn Fn(&Value) -> Result<Value, ComputeError> + Send + Sync;

/// A shareable, pure function from a document to a value.
#[derive(Clone)]
pub struct Computed {
    name: Option<String>,
    func: Arc<ComputeFn>,
}

impl Computed {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            func: Arc::new(func),
        }
    }

    pub fn named<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.to_string()),
            func: Arc::new(func),
        }
    }

    /// A computed value that cannot fail.
    pub fn infallible<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::new(move |doc| Ok(func(doc)))
    }

    /// Sum the numbers found at `search` under `root` (broadcasting over a
    /// list at `root`). Nested lists of numbers are summed too; a missing
    /// root sums to zero; any non-numeric hit is an error.
    pub fn sum_of(root: &str, search: &str) -> Self {
        let root = DocPath::new(root);
        let search = DocPath::new(search);
        let name = format!("sum({}, {})", root, search);
        Self::named(&name, move |doc| {
            let total = match broadcast(doc, &root, &search) {
                Some(found) => sum_numbers(&found)?,
                None => 0.0,
            };
            Number::from_f64(total)
                .map(Value::Number)
                .ok_or_else(|| ComputeError::new(format!("sum is not a finite number: {}", total)))
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn call(&self, document: &Value) -> Result<Value, ComputeError> {
        (self.func)(document)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Computed({})", name),
            None => write!(f, "Computed(<anonymous>)"),
        }
    }
}

fn sum_numbers(value: &Value) -> Result<f64, ComputeError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ComputeError::new(format!("{} is not representable as f64", n))),
        Value::Array(items) => items.iter().map(sum_numbers).sum(),
        Value::Null => Ok(0.0),
        other => Err(ComputeError::new(format!("cannot sum non-numeric value {}", other))),
    }
}

/// Named computed values, used when specs are loaded from JSON (`{"$call": "name"}`).
#[derive(Clone, Default, Debug)]
pub struct CallableRegistry {
    entries: HashMap<String, Computed>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any previous entry.
    pub fn with<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        self.insert(name, Computed::named(name, func));
        self
    }

    pub fn insert(&mut self, name: &str, computed: Computed) {
        self.entries.insert(name.to_string(), computed);
    }

    pub fn get(&self, name: &str) -> Option<&Computed> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Resolve deferred fields against a snapshot of a resolved mapping.
///
/// Each closure receives the snapshot rendered as JSON; its result replaces
/// (or adds) the corresponding field. Fails if `resolved` is not a mapping.
pub fn resolve_deferred(resolved: &mut Resolved, deferred: &IndexMap<String, Computed>) -> Result<()> {
    if deferred.is_empty() {
        return Ok(());
    }
    let snapshot = resolved.to_value();
    let Resolved::Map(fields) = resolved else {
        return Err(MappingError::malformed("", "deferred fields require a mapping at the root"));
    };

    for (key, computed) in deferred {
        tracing::trace!(field = %key, computed = ?computed, "resolving deferred field");
        let value = computed.call(&snapshot).map_err(|source| MappingError::Computation {
            location: child_location("", key),
            source,
        })?;
        fields.insert(key.clone(), Resolved::Value(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map_of(pairs: &[(&str, Value)]) -> Resolved {
        Resolved::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Resolved::Value(v.clone())))
                .collect(),
        )
    }

    #[test]
    fn test_resolve_basic_deferred() {
        let mut resolved = map_of(&[("host", json!("localhost")), ("port", json!(5432))]);

        let mut deferred: IndexMap<String, Computed> = IndexMap::new();
        deferred.insert(
            "full_url".to_string(),
            Computed::infallible(|doc| {
                let host = doc["host"].as_str().unwrap_or("unknown");
                let port = doc["port"].as_u64().unwrap_or(0);
                json!(format!("{}:{}", host, port))
            }),
        );

        resolve_deferred(&mut resolved, &deferred).unwrap();

        assert_eq!(resolved.get("full_url"), Some(&Resolved::Value(json!("localhost:5432"))));
        assert_eq!(resolved.get("host"), Some(&Resolved::Value(json!("localhost"))));
    }

    #[test]
    fn test_multiple_deferred_see_snapshot() {
        let mut resolved = map_of(&[("base", json!("hello"))]);

        let mut deferred: IndexMap<String, Computed> = IndexMap::new();
        deferred.insert(
            "a".to_string(),
            Computed::infallible(|doc| json!(format!("{}-a", doc["base"].as_str().unwrap_or("")))),
        );
        deferred.insert(
            "b".to_string(),
            Computed::infallible(|doc| json!(doc.get("a").is_some())),
        );

        resolve_deferred(&mut resolved, &deferred).unwrap();

        assert_eq!(resolved.get("a"), Some(&Resolved::Value(json!("hello-a"))));
        assert_eq!(resolved.get("b"), Some(&Resolved::Value(json!(false))));
    }

    #[test]
    fn test_deferred_failure_propagates() {
        let mut resolved = map_of(&[("x", json!(1))]);
        let mut deferred: IndexMap<String, Computed> = IndexMap::new();
        deferred.insert(
            "broken".to_string(),
            Computed::new(|_| Err(ComputeError::new("upstream total missing"))),
        );

        let err = resolve_deferred(&mut resolved, &deferred).unwrap_err();
        match err {
            MappingError::Computation { location, source } => {
                assert_eq!(location, "broken");
                assert_eq!(source.message(), "upstream total missing");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_deferred_requires_mapping_root() {
        let mut resolved = Resolved::Value(json!([1, 2]));
        let mut deferred: IndexMap<String, Computed> = IndexMap::new();
        deferred.insert("n".to_string(), Computed::infallible(|_| json!(0)));
        assert!(resolve_deferred(&mut resolved, &deferred).is_err());
    }

    #[test]
    fn test_sum_of_broadcast() {
        let doc = json!({
            "total_discount": [{"amount": 7.64}, {"amount": 3.05}]
        });
        let total = Computed::sum_of("total_discount", "amount").call(&doc).unwrap();
        assert!((total.as_f64().unwrap() - 10.69).abs() < 1e-9);
    }

    #[test]
    fn test_sum_of_missing_root_is_zero() {
        let total = Computed::sum_of("nothing", "amount").call(&json!({})).unwrap();
        assert_eq!(total.as_f64(), Some(0.0));
    }

    #[test]
    fn test_sum_of_rejects_strings() {
        let doc = json!({"items": [{"amount": "7.64"}]});
        let err = Computed::sum_of("items", "amount").call(&doc).unwrap_err();
        assert!(err.message().contains("non-numeric"));
    }

    #[test]
    fn test_wrapped_error_keeps_source() {
        use std::error::Error as _;
        let parse_err = "x".parse::<i32>().unwrap_err();
        let err = ComputeError::wrap(parse_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = CallableRegistry::new().with("one", |_| Ok(json!(1)));
        assert!(registry.contains("one"));
        assert_eq!(registry.get("one").unwrap().call(&json!({})).unwrap(), json!(1));
        assert_eq!(registry.get("one").unwrap().name(), Some("one"));
        assert!(registry.get("two").is_none());
    }
}
