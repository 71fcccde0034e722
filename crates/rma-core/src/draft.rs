//! Drafts and embeddings.
//!
//! A draft is what the generator produced for one attempt. Everything in it
//! is untrusted: the text may be missing, and the self-reported confidence
//! may be any JSON value at all.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Fixed-dimension semantic vector for a query or draft.
pub type Embedding = Vec<f32>;

/// One candidate output from the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Generated text. Policy evaluation requires it to be present and non-empty.
    #[serde(rename = "output", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Generator's self-report, on an uncertainty scale (0.0 = fully certain).
    ///
    /// Kept as a raw JSON value; the sanitizer decides what it is worth.
    #[serde(rename = "uncertainty", default, skip_serializing_if = "Option::is_none")]
    pub self_reported_confidence: Option<JsonValue>,
}

impl Draft {
    /// Draft with text and no self-report.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            self_reported_confidence: None,
        }
    }

    /// Draft with text and a numeric self-report.
    pub fn with_uncertainty(text: impl Into<String>, uncertainty: f64) -> Self {
        Self {
            text: Some(text.into()),
            self_reported_confidence: Some(JsonValue::from(uncertainty)),
        }
    }

    /// Attach a raw self-report value.
    pub fn reported(mut self, value: JsonValue) -> Self {
        self.self_reported_confidence = Some(value);
        self
    }

    /// Parse the wire form `{"output": ..., "uncertainty": ...}`.
    ///
    /// Unknown keys are ignored. A non-string `output` is treated as absent so
    /// the structural check can reject it.
    pub fn from_json(value: &JsonValue) -> Self {
        let text = value
            .get("output")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let self_reported_confidence = value
            .get("uncertainty")
            .filter(|v| !v.is_null())
            .cloned();

        Self {
            text,
            self_reported_confidence,
        }
    }

    /// Text if it is present and not blank.
    pub fn extractable_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_reads_wire_keys() {
        let draft = Draft::from_json(&json!({"output": "The answer is 4.", "uncertainty": 0.1}));
        assert_eq!(draft.text.as_deref(), Some("The answer is 4."));
        assert_eq!(draft.self_reported_confidence, Some(json!(0.1)));
    }

    #[test]
    fn test_from_json_missing_output() {
        let draft = Draft::from_json(&json!({"uncertainty": 0.1}));
        assert!(draft.text.is_none());
        assert!(draft.extractable_text().is_none());
    }

    #[test]
    fn test_non_string_output_is_absent() {
        let draft = Draft::from_json(&json!({"output": 42}));
        assert!(draft.text.is_none());
    }

    #[test]
    fn test_null_uncertainty_is_absent() {
        let draft = Draft::from_json(&json!({"output": "x", "uncertainty": null}));
        assert!(draft.self_reported_confidence.is_none());
    }

    #[test]
    fn test_blank_text_not_extractable() {
        assert!(Draft::text("   \n").extractable_text().is_none());
        assert_eq!(Draft::text(" ok ").extractable_text(), Some(" ok "));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let draft = Draft::with_uncertainty("hello", 0.2);
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value, json!({"output": "hello", "uncertainty": 0.2}));

        let back: Draft = serde_json::from_value(value).unwrap();
        assert_eq!(back, draft);
    }
}
