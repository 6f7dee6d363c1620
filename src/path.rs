//! Dotted-path lookups into JSON documents.
//!
//! A path is a `.`-separated list of segments. On an object a segment is a
//! key; on an array it must be a decimal index. Any segment that does not
//! match yields "absent" rather than an error. The empty path addresses the
//! document itself.

use std::fmt;

use serde_json::Value;

use crate::utils::{display_location, MappingError, Result};

/// Segment separator. Field names containing it cannot be addressed.
pub const SEPARATOR: char = '.';

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    raw: String,
    segments: Vec<String>,
}

impl DocPath {
    /// Split `raw` into segments. Never fails; malformed paths are reported by [`DocPath::check`].
    pub fn new(raw: &str) -> Self {
        let segments = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split(SEPARATOR).map(str::to_string).collect()
        };
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The empty path, addressing the document itself.
    pub fn root() -> Self {
        Self::new("")
    }

    /// Parse and check in one step.
    pub fn parse(raw: &str) -> Result<Self> {
        let path = Self::new(raw);
        path.check("")?;
        Ok(path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Reject empty segments (`a..b`, `.a`, `a.`).
    pub fn check(&self, location: &str) -> Result<()> {
        if self.segments.iter().any(String::is_empty) {
            return Err(MappingError::InvalidPath {
                path: self.raw.clone(),
                location: display_location(location),
                reason: "path contains an empty segment".to_string(),
            });
        }
        Ok(())
    }

    /// Follow the path through `document`.
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| step(current, segment))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for DocPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Look up `path` in `document`; `Ok(None)` when any segment is absent.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Result<Option<&'a Value>> {
    Ok(DocPath::parse(path)?.get(document))
}

/// Look up `path` in `document`, falling back to `default` when absent.
pub fn lookup_or(document: &Value, path: &str, default: Value) -> Result<Value> {
    Ok(lookup(document, path)?.cloned().unwrap_or(default))
}

/// Resolve `search` under `root`, broadcasting across a list found at `root`.
pub fn lookup_pair(document: &Value, root: &str, search: &str) -> Result<Option<Value>> {
    Ok(broadcast(document, &DocPath::parse(root)?, &DocPath::parse(search)?))
}

/// [`lookup_pair`], falling back to `default` when nothing is found.
pub fn lookup_pair_or(document: &Value, root: &str, search: &str, default: Value) -> Result<Value> {
    Ok(lookup_pair(document, root, search)?.unwrap_or(default))
}

/// Resolve `root`; if it is an array, apply `search` to every element and
/// collect the present results in element order, otherwise apply `search`
/// to the root value directly.
///
/// Only the list found at `root` is fanned out. Lists met while following
/// `search` are indexed like any other path, so a non-numeric segment on
/// them finds nothing.
pub fn broadcast(document: &Value, root: &DocPath, search: &DocPath) -> Option<Value> {
    match root.get(document)? {
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| search.get(item)).cloned().collect(),
        )),
        value => search.get(value).cloned(),
    }
}
