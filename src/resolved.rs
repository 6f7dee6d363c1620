//! The untyped result of walking a mapping spec against a document.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// A resolved value whose shape mirrors the mapping that produced it.
///
/// `Absent` marks "no match in the document" and is kept distinct from a
/// matched JSON `null`, so the binder can decide on defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Resolved {
    #[default]
    Absent,
    Value(Value),
    List(Vec<Resolved>),
    Map(IndexMap<String, Resolved>),
}

impl Resolved {
    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }

    /// Field of a resolved mapping.
    pub fn get(&self, field: &str) -> Option<&Resolved> {
        match self {
            Resolved::Map(fields) => fields.get(field),
            _ => None,
        }
    }

    /// Render as plain JSON. `Absent` becomes `null`, which loses the distinction.
    pub fn to_value(&self) -> Value {
        match self {
            Resolved::Absent => Value::Null,
            Resolved::Value(value) => value.clone(),
            Resolved::List(items) => Value::Array(items.iter().map(Resolved::to_value).collect()),
            Resolved::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_value()))
                    .collect(),
            ),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Resolved::Absent => Value::Null,
            Resolved::Value(value) => value,
            Resolved::List(items) => Value::Array(items.into_iter().map(Resolved::into_value).collect()),
            Resolved::Map(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, value.into_value()))
                    .collect(),
            ),
        }
    }

    /// Render for binding: absent map fields are dropped so the binder sees
    /// them as missing, absent list elements become `null`.
    /// Returns `None` when the whole value is absent.
    pub fn to_bind_input(&self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Value(value) => Some(value.clone()),
            Resolved::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.to_bind_input().unwrap_or(Value::Null))
                    .collect(),
            )),
            Resolved::Map(fields) => {
                let mut out = Map::new();
                for (key, value) in fields {
                    if let Some(v) = value.to_bind_input() {
                        out.insert(key.clone(), v);
                    }
                }
                Some(Value::Object(out))
            }
        }
    }

    /// Elements to fan a per-element template over.
    ///
    /// Absent and `null` yield `None`; a single non-list value counts as one
    /// element. Absent items of a list become `null` so every item keeps its slot.
    pub(crate) fn into_elements(self) -> Option<Vec<Value>> {
        match self {
            Resolved::Absent | Resolved::Value(Value::Null) => None,
            Resolved::Value(Value::Array(items)) => Some(items),
            Resolved::Value(value) => Some(vec![value]),
            Resolved::List(items) => Some(items.into_iter().map(Resolved::into_value).collect()),
            map @ Resolved::Map(_) => Some(vec![map.into_value()]),
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Resolved::Value(value)
    }
}

impl From<Option<Value>> for Resolved {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Resolved::Absent, Resolved::Value)
    }
}
