//! The recursive resolver.
//!
//! [`resolve`] walks a [`MappingSpec`] against a read-only document and
//! returns a [`Resolved`] value shaped like the mapping. It is pure: the same
//! spec and document always produce the same result or the same error.
//! Unmatched paths become [`Resolved::Absent`] (or the configured default);
//! malformed nodes and computed-value failures are returned as errors.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::binder;
use crate::config::MapperConfig;
use crate::deferred::{resolve_deferred, Computed};
use crate::merge::merge_collapse;
use crate::path::DocPath;
use crate::resolved::Resolved;
use crate::spec::MappingSpec;
use crate::utils::{child_location, display_location, index_location, MappingError, Result};

/// Resolve `spec` against `document` with the default config.
pub fn resolve(spec: &MappingSpec, document: &Value) -> Result<Resolved> {
    resolve_with(spec, document, &MapperConfig::default())
}

/// Resolve `spec` against `document`.
pub fn resolve_with(spec: &MappingSpec, document: &Value, config: &MapperConfig) -> Result<Resolved> {
    Resolver { config }.visit(spec, document, "")
}

/// A validated spec plus settings and deferred fields, reusable across documents.
///
/// `Mapper` holds no per-call state; one instance can be shared between
/// threads and used concurrently.
#[derive(Debug, Clone)]
pub struct Mapper {
    spec: MappingSpec,
    config: MapperConfig,
    deferred: IndexMap<String, Computed>,
}

impl Mapper {
    /// Validate `spec` up front so malformed nodes fail before any document is seen.
    pub fn new(spec: MappingSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            config: MapperConfig::default(),
            deferred: IndexMap::new(),
        })
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a field computed from the resolved mapping after all other
    /// fields are resolved. Requires a [`MappingSpec::Map`] root.
    pub fn with_deferred(mut self, field: &str, computed: Computed) -> Self {
        self.deferred.insert(field.to_string(), computed);
        self
    }

    pub fn spec(&self) -> &MappingSpec {
        &self.spec
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn resolve(&self, document: &Value) -> Result<Resolved> {
        let _span = tracing::debug_span!("resolve").entered();
        let mut resolved = resolve_with(&self.spec, document, &self.config)?;
        resolve_deferred(&mut resolved, &self.deferred)?;
        Ok(resolved)
    }

    /// Resolve `document` and bind the result into `T`.
    pub fn bind<T>(&self, document: &Value) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let resolved = self.resolve(document)?;
        Ok(binder::bind(&resolved, &self.config)?)
    }
}

struct Resolver<'a> {
    config: &'a MapperConfig,
}

impl Resolver<'_> {
    fn visit(&self, spec: &MappingSpec, document: &Value, location: &str) -> Result<Resolved> {
        spec.check_node(location)?;
        match spec {
            MappingSpec::Path(path) => Ok(self.lookup(path, document, location)),
            MappingSpec::Merge { roots, search } => Ok(Resolved::Value(Value::Array(merge_collapse(
                document, roots, search,
            )))),
            MappingSpec::Map(fields) => {
                let mut out = IndexMap::with_capacity(fields.len());
                for (name, node) in fields {
                    let value = self.visit(node, document, &child_location(location, name))?;
                    out.insert(name.clone(), value);
                }
                Ok(Resolved::Map(out))
            }
            MappingSpec::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.visit(item, document, &index_location(location, i)))
                .collect::<Result<Vec<_>>>()
                .map(Resolved::List),
            MappingSpec::Literal(value) => Ok(Resolved::Value(value.clone())),
            MappingSpec::Computed(computed) => {
                tracing::trace!(location, computed = ?computed, "calling computed value");
                computed
                    .call(document)
                    .map(Resolved::Value)
                    .map_err(|source| MappingError::Computation {
                        location: display_location(location),
                        source,
                    })
            }
            MappingSpec::Each { source, template } => {
                let Some(elements) = self.visit_source(source, document, location)?.into_elements() else {
                    return Ok(self.absent(location));
                };
                elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| self.visit(template, element, &index_location(location, i)))
                    .collect::<Result<Vec<_>>>()
                    .map(Resolved::List)
            }
            MappingSpec::Coalesce { paths, default } => {
                let hit = paths
                    .iter()
                    .filter_map(|path| path.get(document))
                    .find(|value| !value.is_null());
                Ok(match (hit, default) {
                    (Some(value), _) => Resolved::Value(value.clone()),
                    (None, Some(default)) => Resolved::Value(default.clone()),
                    (None, None) => self.absent(location),
                })
            }
        }
    }

    /// Resolve the list feeding a mapped list. The absent default is not
    /// applied inside the source so a missing list stays missing.
    fn visit_source(&self, source: &MappingSpec, document: &Value, location: &str) -> Result<Resolved> {
        if self.config.absent_default.is_none() {
            return self.visit(source, document, location);
        }
        let config = MapperConfig {
            absent_default: None,
            ..self.config.clone()
        };
        Resolver { config: &config }.visit(source, document, location)
    }

    fn lookup(&self, path: &DocPath, document: &Value, location: &str) -> Resolved {
        match path.get(document) {
            Some(value) => Resolved::Value(value.clone()),
            None => {
                tracing::trace!(location, path = %path, "path not found");
                self.absent(location)
            }
        }
    }

    fn absent(&self, location: &str) -> Resolved {
        match &self.config.absent_default {
            Some(default) => {
                tracing::trace!(location, "substituting configured absent default");
                Resolved::Value(default.clone())
            }
            None => Resolved::Absent,
        }
    }
}
