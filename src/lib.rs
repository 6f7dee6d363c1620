//! Declarative mapping of nested JSON documents into strongly-typed models.
//!
//! A [`MappingSpec`] describes where each output field comes from: a dotted
//! path, a merge of several roots, a literal, a computed value, a mapped list
//! or a nested map. [`resolve`] turns a spec plus a document into a
//! [`Resolved`] value, and the binder validates that value against the target
//! type's JSON Schema (derived with `schemars`) before deserializing it.

pub mod binder;
pub mod config;
pub mod deferred;
pub mod engine;
pub mod merge;
pub mod model;
pub mod path;
pub mod resolved;
pub mod schema;
pub mod spec;
pub mod spec_file;
pub mod utils;

pub use binder::{bind, bind_value, check_value, BindError, FieldViolation};
pub use config::{Coercion, MapperConfig};
pub use deferred::{CallableRegistry, ComputeError, Computed};
pub use engine::{resolve, resolve_with, Mapper};
pub use merge::{merge_by_key, merge_collapse};
pub use model::{DocumentMapper, Resolvable, Validatable};
pub use path::{lookup, lookup_or, lookup_pair, lookup_pair_or, DocPath};
pub use resolved::Resolved;
pub use schema::OutputSchema;
pub use spec::MappingSpec;
pub use spec_file::{load_spec_file, spec_from_str, spec_from_value};
pub use utils::{MappingError, Result};
