//! Charter rules: named, threshold-bearing constraints.

use serde::{Deserialize, Serialize};

use crate::signals::clamp_ceiling;

/// A named constraint the heuristic policy enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharterRule {
    /// Unique identifier (e.g., "C1")
    #[serde(rename = "id")]
    pub rule_id: String,

    /// Human-readable statement of the rule
    #[serde(default)]
    pub description: String,

    /// Violation threshold in `[0, 1]`
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl CharterRule {
    pub fn new(rule_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            description: description.into(),
            threshold: default_threshold(),
        }
    }

    /// Clamped into `[0, 1]`; NaN becomes `0.0`.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = clamp_ceiling(threshold);
        self
    }
}

/// Scores a draft against a charter rule.
///
/// `None` means the evaluator has no check for the rule, which counts as
/// satisfied. `Some(score)` is a violation score compared (after clamping)
/// against the rule threshold.
pub trait CharterEvaluator: Send + Sync {
    fn score(&self, rule: &CharterRule, text: &str) -> Option<f64>;
}

/// Evaluator with no semantic checks; every rule is satisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSemanticChecks;

impl CharterEvaluator for NoSemanticChecks {
    fn score(&self, _rule: &CharterRule, _text: &str) -> Option<f64> {
        None
    }
}
