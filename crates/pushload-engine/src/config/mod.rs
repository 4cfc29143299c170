//! Job configuration: YAML types, parsing, and semantic validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use types::{
    ApiConfig, AuthConfig, InputConfig, JobConfig, LoadLimits, RelationshipLink,
    SchemaMismatchPolicy,
};
