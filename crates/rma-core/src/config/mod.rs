//! Kernel configuration.
//!
//! Configuration is structured data validated against an embedded JSON
//! Schema, then checked semantically. It is immutable once loaded and is
//! shared read-only across runs.

mod parser;
mod schema;

pub use parser::{ConfigError, KernelConfig, DEFAULT_MAX_ITERATIONS};
pub use schema::{validate_config_schema, SchemaError};
