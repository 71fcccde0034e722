//! Kernel configuration parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::schema::validate_config_schema;
use crate::policy::{
    CharterEvaluator, CharterRule, DriftPolicy, HeuristicPolicy, PolicyMode, VerificationPolicy,
    DEFAULT_DRIFT_CEILING, DEFAULT_UNCERTAINTY_CEILING,
};
use crate::signals::{default_markers, LexicalScanner, Marker, MarkerError, UncertaintyAggregator};

/// Default iteration budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config schema validation failed: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Invalid marker table: {0}")]
    Marker(#[from] MarkerError),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Construction-time configuration, immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Maximum generator calls per run (>= 1)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Ceiling on combined uncertainty
    #[serde(default = "default_uncertainty_ceiling")]
    pub uncertainty_ceiling: f64,

    /// Ceiling on query/draft drift
    #[serde(default = "default_drift_ceiling")]
    pub drift_ceiling: f64,

    /// Policy backend
    #[serde(default)]
    pub mode: PolicyMode,

    /// Ordered marker table; defaults to the built-in table
    #[serde(default = "default_markers")]
    pub markers: Vec<Marker>,

    /// Ordered charter rules
    #[serde(default)]
    pub charter: Vec<CharterRule>,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_uncertainty_ceiling() -> f64 {
    DEFAULT_UNCERTAINTY_CEILING
}

fn default_drift_ceiling() -> f64 {
    DEFAULT_DRIFT_CEILING
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            uncertainty_ceiling: DEFAULT_UNCERTAINTY_CEILING,
            drift_ceiling: DEFAULT_DRIFT_CEILING,
            mode: PolicyMode::default(),
            markers: default_markers(),
            charter: Vec::new(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Schema-check, deserialize and validate a JSON value.
    ///
    /// A null document (YAML `~`) yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let value = if value.is_null() {
            serde_json::json!({})
        } else {
            value
        };

        validate_config_schema(&value).map_err(ConfigError::SchemaViolation)?;

        let config: KernelConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("uncertainty_ceiling", self.uncertainty_ceiling),
            ("drift_ceiling", self.drift_ceiling),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.charter {
            if !seen.insert(rule.rule_id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate charter rule id: {}",
                    rule.rule_id
                )));
            }
            if !(0.0..=1.0).contains(&rule.threshold) {
                return Err(ConfigError::ValidationError(format!(
                    "Charter rule {} threshold must be in [0, 1], got {}",
                    rule.rule_id, rule.threshold
                )));
            }
        }

        LexicalScanner::new(self.markers.clone())?;
        Ok(())
    }

    /// Compile the marker table.
    pub fn scanner(&self) -> Result<LexicalScanner, ConfigError> {
        Ok(LexicalScanner::new(self.markers.clone())?)
    }

    /// Build the policy backend selected by `mode`.
    pub fn build_policy(&self) -> Result<Arc<dyn VerificationPolicy>, ConfigError> {
        self.validate()?;
        let scanner = self.scanner()?;

        let policy: Arc<dyn VerificationPolicy> = match self.mode {
            PolicyMode::Embedding => Arc::new(
                DriftPolicy::new(UncertaintyAggregator::new(scanner))
                    .with_uncertainty_ceiling(self.uncertainty_ceiling)
                    .with_drift_ceiling(self.drift_ceiling),
            ),
            PolicyMode::Heuristic => Arc::new(HeuristicPolicy::new(scanner, self.charter.clone())),
        };

        Ok(policy)
    }

    /// Build the heuristic backend with a custom charter evaluator.
    pub fn build_heuristic_policy(
        &self,
        evaluator: Arc<dyn CharterEvaluator>,
    ) -> Result<Arc<dyn VerificationPolicy>, ConfigError> {
        self.validate()?;
        Ok(Arc::new(
            HeuristicPolicy::new(self.scanner()?, self.charter.clone()).with_evaluator(evaluator),
        ))
    }
}
