//! JSON Schema validation for kernel configuration.
//!
//! Configuration is validated against `schema/kernel-config.schema.json`
//! before it is deserialized, so typos and out-of-range values surface with
//! a path instead of a serde message.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded configuration schema (loaded at compile time).
const CONFIG_SCHEMA_JSON: &str = include_str!("../../schema/kernel-config.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a configuration value against the schema.
///
/// Returns every violation, each suffixed with its instance path.
pub fn validate_config_schema(config_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(config_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_config_is_valid() {
        assert!(validate_config_schema(&json!({})).is_ok());
    }

    #[test]
    fn test_full_config_is_valid() {
        let value = json!({
            "max_iterations": 3,
            "uncertainty_ceiling": 0.5,
            "drift_ceiling": 0.2,
            "mode": "heuristic",
            "markers": [
                { "phrase": "maybe", "weight": 0.15 },
                { "phrase": "as an ai", "weight": 0.9, "category": "refusal" }
            ],
            "charter": [
                { "id": "C1", "description": "Cite sources", "threshold": 0.5 },
                { "id": "C2" }
            ]
        });
        assert!(validate_config_schema(&value).is_ok());
    }

    #[test]
    fn test_zero_iterations_fails() {
        assert!(validate_config_schema(&json!({ "max_iterations": 0 })).is_err());
    }

    #[test]
    fn test_ceiling_out_of_range_fails() {
        let errors = validate_config_schema(&json!({ "drift_ceiling": 1.5 })).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("drift_ceiling")));
    }

    #[test]
    fn test_unknown_mode_fails() {
        assert!(validate_config_schema(&json!({ "mode": "vibes" })).is_err());
    }

    #[test]
    fn test_unknown_field_fails() {
        assert!(validate_config_schema(&json!({ "max_iteration": 3 })).is_err());
    }

    #[test]
    fn test_marker_requires_weight() {
        assert!(validate_config_schema(&json!({ "markers": [{ "phrase": "maybe" }] })).is_err());
    }

    #[test]
    fn test_unknown_marker_category_fails() {
        let value = json!({ "markers": [{ "phrase": "x", "weight": 0.1, "category": "rude" }] });
        assert!(validate_config_schema(&value).is_err());
    }
}
