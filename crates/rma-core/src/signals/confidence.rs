//! Sanitizer for the generator's self-reported confidence.

use serde_json::Value as JsonValue;

use super::clamp_unit;

/// Normalizes an untrusted self-report into `[0, 1]`.
///
/// Fail-closed: anything that does not coerce to a number is treated as
/// maximal uncertainty, never as confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceSanitizer;

impl ConfidenceSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Sanitize a raw JSON self-report.
    ///
    /// Numbers and numeric strings are clamped into range; everything else
    /// (null, booleans, objects, unparsable strings, NaN) scores `1.0`.
    pub fn sanitize(&self, value: &JsonValue) -> f64 {
        match value {
            JsonValue::Number(n) => n.as_f64().map(clamp_unit).unwrap_or(1.0),
            JsonValue::String(s) => self.sanitize_str(s),
            _ => 1.0,
        }
    }

    /// Sanitize a textual self-report.
    pub fn sanitize_str(&self, raw: &str) -> f64 {
        raw.trim()
            .parse::<f64>()
            .map(clamp_unit)
            .unwrap_or(1.0)
    }

    /// Sanitize an already-numeric self-report.
    pub fn sanitize_f64(&self, value: f64) -> f64 {
        clamp_unit(value)
    }
}
