//! Capabilities for types that map documents into output models.
//!
//! [`Resolvable`] supplies a spec and a source document; [`Validatable`]
//! checks a value against its own schema. They are independent traits and a
//! type opts into each separately.

use std::marker::PhantomData;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::binder::{self, BindError};
use crate::config::MapperConfig;
use crate::engine::Mapper;
use crate::resolved::Resolved;
use crate::schema::OutputSchema;
use crate::spec::MappingSpec;
use crate::utils::Result;

/// A source that knows how to map itself into [`Resolvable::Output`].
///
/// ```
/// use mapped_schema::{MappingSpec, Resolvable, Result};
/// use schemars::JsonSchema;
/// use serde::{Deserialize, Serialize};
/// use serde_json::{json, Value};
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Store {
///     store_hash: String,
///     platform: String,
/// }
///
/// #[derive(Serialize)]
/// struct StoreInput {
///     store_hash: String,
/// }
///
/// impl Resolvable for StoreInput {
///     type Output = Store;
///
///     fn specification(&self) -> Result<MappingSpec> {
///         let mut fields = MappingSpec::identity(&self.document()?, &[])?;
///         fields.insert("platform".to_string(), MappingSpec::literal("BigCommerce"));
///         Ok(MappingSpec::Map(fields))
///     }
///
///     fn document(&self) -> Result<Value> {
///         Ok(serde_json::to_value(self)?)
///     }
/// }
///
/// let store = StoreInput { store_hash: "11111".to_string() }.mapped()?;
/// assert_eq!(store.store_hash, "11111");
/// assert_eq!(store.platform, "BigCommerce");
/// # Ok::<_, mapped_schema::MappingError>(())
/// ```
pub trait Resolvable {
    type Output: DeserializeOwned + JsonSchema;

    fn specification(&self) -> Result<MappingSpec>;

    fn document(&self) -> Result<Value>;

    fn config(&self) -> MapperConfig {
        MapperConfig::default()
    }

    fn resolve(&self) -> Result<Resolved> {
        Mapper::new(self.specification()?)?
            .with_config(self.config())
            .resolve(&self.document()?)
    }

    fn mapped(&self) -> Result<Self::Output> {
        let resolved = self.resolve()?;
        Ok(binder::bind(&resolved, &self.config())?)
    }
}

/// A value that can check itself against its declared schema.
pub trait Validatable {
    fn validate(&self) -> std::result::Result<(), BindError>;
}

impl<T> Validatable for T
where
    T: Serialize + JsonSchema,
{
    fn validate(&self) -> std::result::Result<(), BindError> {
        let value = serde_json::to_value(self).map_err(|e| BindError::single("", e.to_string()))?;
        let config = MapperConfig::default().with_coercion(crate::config::Coercion::Strict);
        binder::check_value(&value, &OutputSchema::of::<T>(), &config)
    }
}

/// A document paired with a shared mapper, bound into `T` on demand.
pub struct DocumentMapper<T> {
    document: Value,
    mapper: Arc<Mapper>,
    _output: PhantomData<fn() -> T>,
}

impl<T> DocumentMapper<T>
where
    T: DeserializeOwned + JsonSchema,
{
    pub fn new(mapper: Arc<Mapper>, document: Value) -> Self {
        Self {
            document,
            mapper,
            _output: PhantomData,
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn resolved(&self) -> Result<Resolved> {
        self.mapper.resolve(&self.document)
    }

    pub fn mapped(&self) -> Result<T> {
        self.mapper.bind(&self.document)
    }
}
