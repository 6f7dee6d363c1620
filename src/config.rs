//! Resolver and binder settings.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::{coerce_boolean, MappingError, Result};

pub const ENV_NONES_TO_DEFAULT: &str = "MAPPED_NONES_TO_DEFAULT";
pub const ENV_COERCION: &str = "MAPPED_COERCION";
pub const ENV_ABSENT_DEFAULT: &str = "MAPPED_ABSENT_DEFAULT";

/// How the binder treats values whose JSON type differs from the field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Types must match exactly.
    Strict,
    /// Numeric and boolean strings are parsed, numbers and booleans stringified.
    #[default]
    Lax,
}

impl FromStr for Coercion {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Coercion::Strict),
            "lax" => Ok(Coercion::Lax),
            _ => Err(MappingError::InvalidConfig {
                key: ENV_COERCION.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Settings shared by [`crate::Mapper`] and the binder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Value substituted for unmatched paths. `None` keeps them absent so the
    /// binder applies field defaults.
    pub absent_default: Option<Value>,
    /// Replace an explicit `null` with the field's declared default.
    pub nones_to_default: bool,
    pub coercion: Coercion,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            absent_default: None,
            nones_to_default: true,
            coercion: Coercion::Lax,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absent_default(mut self, value: Value) -> Self {
        self.absent_default = Some(value);
        self
    }

    pub fn with_nones_to_default(mut self, enabled: bool) -> Self {
        self.nones_to_default = enabled;
        self
    }

    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Defaults overridden by `MAPPED_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&env)
    }

    /// Defaults overridden by entries of a provided env map.
    ///
    /// `MAPPED_ABSENT_DEFAULT` is parsed as JSON, falling back to a plain string.
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = env.get(ENV_NONES_TO_DEFAULT) {
            config.nones_to_default = coerce_boolean(value);
        }
        if let Some(value) = env.get(ENV_COERCION) {
            config.coercion = value.parse()?;
        }
        if let Some(value) = env.get(ENV_ABSENT_DEFAULT) {
            let parsed = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.clone()));
            config.absent_default = Some(parsed);
        }
        Ok(config)
    }
}
