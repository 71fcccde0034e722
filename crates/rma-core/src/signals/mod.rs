//! Quality signals computed over a single draft.
//!
//! Every signal is cheap, pure and fail-closed: input that cannot be
//! interpreted scores as the worst case rather than raising an error.

mod confidence;
mod drift;
mod lexical;
mod uncertainty;

pub use confidence::ConfidenceSanitizer;
pub use drift::{CosineDrift, DriftMetric};
pub use lexical::{default_markers, LexicalScanner, Marker, MarkerCategory, MarkerError, MarkerMatch};
pub use uncertainty::{UncertaintyAggregator, UncertaintyBreakdown};

/// Clamp a score into `[0.0, 1.0]` before any threshold comparison.
///
/// NaN is not a score; it clamps to the worst case.
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        1.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Clamp a ceiling or threshold into `[0.0, 1.0]`.
///
/// NaN maps to `0.0`, so any positive score still exceeds it.
pub fn clamp_ceiling(ceiling: f64) -> f64 {
    if ceiling.is_nan() {
        0.0
    } else {
        ceiling.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(0.3), 0.3);
        assert_eq!(clamp_unit(7.0), 1.0);
        assert_eq!(clamp_unit(f64::NAN), 1.0);
        assert_eq!(clamp_unit(f64::INFINITY), 1.0);
        assert_eq!(clamp_unit(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_clamp_ceiling() {
        assert_eq!(clamp_ceiling(f64::NAN), 0.0);
        assert_eq!(clamp_ceiling(-1.0), 0.0);
        assert_eq!(clamp_ceiling(0.4), 0.4);
        assert_eq!(clamp_ceiling(f64::INFINITY), 1.0);
    }
}
