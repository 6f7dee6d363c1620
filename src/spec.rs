//! Mapping specifications: a declarative tree describing where each output
//! field comes from.
//!
//! Every node is constructed deliberately as one variant of [`MappingSpec`];
//! nothing is inferred from the runtime shape of a value. In particular a
//! string inside [`MappingSpec::Literal`] is never treated as a path.

use indexmap::IndexMap;
use serde_json::Value;

use crate::deferred::{ComputeError, Computed};
use crate::path::DocPath;
use crate::utils::{child_location, index_location, is_valid_field_name, MappingError, Result};

/// One node of a mapping specification.
#[derive(Debug, Clone)]
pub enum MappingSpec {
    /// Value at a dotted path. No match resolves to the configured default.
    Path(DocPath),
    /// Values of `search` under each root, flattened one level in root order.
    Merge { roots: Vec<DocPath>, search: DocPath },
    /// Output mapping; each field resolved independently against the same document.
    Map(IndexMap<String, MappingSpec>),
    /// Output list; each item resolved independently against the same document.
    Sequence(Vec<MappingSpec>),
    /// Returned verbatim.
    Literal(Value),
    /// Computed from the whole document.
    Computed(Computed),
    /// Resolve `source` to a list, then resolve `template` against every element.
    Each {
        source: Box<MappingSpec>,
        template: Box<MappingSpec>,
    },
    /// First path with a present, non-null value; otherwise `default`.
    Coalesce {
        paths: Vec<DocPath>,
        default: Option<Value>,
    },
}

impl MappingSpec {
    pub fn path(path: &str) -> Self {
        MappingSpec::Path(DocPath::new(path))
    }

    /// Merge `search` found under each of `roots`. An empty `search` merges
    /// the root values themselves.
    pub fn merge<I, S>(roots: I, search: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MappingSpec::Merge {
            roots: roots.into_iter().map(|r| DocPath::new(r.as_ref())).collect(),
            search: DocPath::new(search),
        }
    }

    pub fn map<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, MappingSpec)>,
        K: Into<String>,
    {
        MappingSpec::Map(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = MappingSpec>,
    {
        MappingSpec::Sequence(items.into_iter().collect())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        MappingSpec::Literal(value.into())
    }

    pub fn computed<F>(func: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Value, ComputeError> + Send + Sync + 'static,
    {
        MappingSpec::Computed(Computed::new(func))
    }

    /// Apply `template` to every element of the list at `source`.
    pub fn each(source: &str, template: MappingSpec) -> Self {
        Self::each_of(MappingSpec::path(source), template)
    }

    /// Apply `template` to every element produced by an arbitrary list-producing node.
    pub fn each_of(source: MappingSpec, template: MappingSpec) -> Self {
        MappingSpec::Each {
            source: Box::new(source),
            template: Box::new(template),
        }
    }

    pub fn coalesce<I, S>(paths: I, default: Option<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MappingSpec::Coalesce {
            paths: paths.into_iter().map(|p| DocPath::new(p.as_ref())).collect(),
            default,
        }
    }

    /// Identity map over the top-level fields of `document`: every field maps
    /// to the path of the same name. Fields listed in `exclude` are left out so
    /// the caller can supply their own nodes.
    pub fn identity(document: &Value, exclude: &[&str]) -> Result<IndexMap<String, MappingSpec>> {
        let Some(fields) = document.as_object() else {
            return Err(MappingError::malformed(
                "",
                "an identity map needs an object document",
            ));
        };
        let mut map = IndexMap::new();
        for key in fields.keys() {
            if exclude.contains(&key.as_str()) {
                continue;
            }
            if !is_valid_field_name(key) {
                return Err(MappingError::malformed(
                    key,
                    "field names may not be empty or contain the path separator",
                ));
            }
            map.insert(key.clone(), MappingSpec::path(key));
        }
        Ok(map)
    }

    /// Check the whole tree, failing on the first malformed node.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("")
    }

    pub(crate) fn validate_at(&self, location: &str) -> Result<()> {
        self.check_node(location)?;
        match self {
            MappingSpec::Map(fields) => {
                for (name, node) in fields {
                    node.validate_at(&child_location(location, name))?;
                }
                Ok(())
            }
            MappingSpec::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.validate_at(&index_location(location, i))?;
                }
                Ok(())
            }
            MappingSpec::Each { source, template } => {
                source.validate_at(location)?;
                template.validate_at(&format!("{}[*]", location))
            }
            _ => Ok(()),
        }
    }

    /// Checks local to this node; children are not visited.
    pub(crate) fn check_node(&self, location: &str) -> Result<()> {
        match self {
            MappingSpec::Path(path) => path.check(location),
            MappingSpec::Merge { roots, search } => {
                if roots.is_empty() {
                    return Err(MappingError::malformed(location, "merge node has no roots"));
                }
                for root in roots {
                    root.check(location)?;
                }
                search.check(location)
            }
            MappingSpec::Map(fields) => {
                match fields.keys().find(|name| !is_valid_field_name(name)) {
                    Some(name) => Err(MappingError::malformed(
                        &child_location(location, name),
                        "field names may not be empty or contain the path separator",
                    )),
                    None => Ok(()),
                }
            }
            MappingSpec::Each { source, .. } => {
                if matches!(**source, MappingSpec::Literal(_) | MappingSpec::Map(_)) {
                    return Err(MappingError::malformed(
                        location,
                        "the source of a mapped list must produce a list",
                    ));
                }
                Ok(())
            }
            MappingSpec::Coalesce { paths, .. } => {
                if paths.is_empty() {
                    return Err(MappingError::malformed(location, "coalesce node has no paths"));
                }
                for path in paths {
                    path.check(location)?;
                }
                Ok(())
            }
            MappingSpec::Sequence(_) | MappingSpec::Literal(_) | MappingSpec::Computed(_) => Ok(()),
        }
    }
}

impl From<&str> for MappingSpec {
    fn from(path: &str) -> Self {
        MappingSpec::path(path)
    }
}
