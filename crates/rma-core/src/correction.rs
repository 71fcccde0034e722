//! Correction instructions fed back to the generator after a rejection.
//!
//! The instruction is opaque to the loop. It always carries the original
//! query verbatim so no context is lost across retries.

use crate::policy::Verdict;

/// Marker the generator is told to emit when data is genuinely missing.
pub const UNKNOWN_MARKER: &str = "UNKNOWN";

/// Builds the steering instruction for the next attempt.
#[derive(Debug, Clone)]
pub struct CorrectionBuilder {
    unknown_marker: String,
}

impl CorrectionBuilder {
    pub fn new() -> Self {
        Self {
            unknown_marker: UNKNOWN_MARKER.to_string(),
        }
    }

    /// Override the explicit unknown marker.
    pub fn with_unknown_marker(mut self, marker: impl Into<String>) -> Self {
        self.unknown_marker = marker.into();
        self
    }

    /// Build an instruction from the failure reason alone.
    pub fn build(&self, original_query: &str, failure_reason: &str) -> String {
        self.render(original_query, failure_reason, None)
    }

    /// Build an instruction from a verdict, folding in the policy's own
    /// correction hint when there is one.
    pub fn build_for(&self, original_query: &str, verdict: &Verdict) -> String {
        let reason = verdict.reason().unwrap_or("Draft rejected");
        self.render(original_query, reason, verdict.correction_instruction())
    }

    fn render(&self, original_query: &str, failure_reason: &str, hint: Option<&str>) -> String {
        let mut out = String::new();

        out.push_str("Your previous answer was rejected.\n");
        out.push_str(&format!("Reason: {}\n", failure_reason));
        if let Some(hint) = hint {
            out.push_str(&format!("Fix: {}\n", hint));
        }

        out.push_str("Rewrite the answer following these rules:\n");
        out.push_str(
            "1. Remove boilerplate refusal language (\"as an AI\", \"I cannot\") and answer directly.\n",
        );
        out.push_str(
            "2. Remove speculative hedging (\"maybe\", \"I think\", \"possibly\"); state only what is supported.\n",
        );
        out.push_str(&format!(
            "3. If the required data is genuinely missing, write {} instead of guessing.\n",
            self.unknown_marker
        ));
        out.push_str(&format!("Original query: {}", original_query));

        out
    }
}

impl Default for CorrectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
