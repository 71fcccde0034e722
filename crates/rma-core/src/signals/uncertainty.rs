//! Worst-case combination of the lexical and self-reported signals.
//!
//! Either signal alone is grounds for suspicion. A model that claims
//! confidence while hedging in its text must not pass, and neither must one
//! that writes cleanly but reports it is unsure. The combination is a strict
//! maximum; do not average or weight-sum it.

use serde::Serialize;

use super::{clamp_unit, ConfidenceSanitizer, LexicalScanner};
use crate::draft::Draft;

/// Component scores behind an uncertainty value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UncertaintyBreakdown {
    /// Lexical scanner severity (0.0 if the draft has no text)
    pub lexical: f64,
    /// Sanitized self-report (0.0 if the draft carries none)
    pub reported: f64,
    /// `max(lexical, reported)`
    pub combined: f64,
}

/// Combines lexical severity and self-reported uncertainty.
#[derive(Debug, Clone, Default)]
pub struct UncertaintyAggregator {
    scanner: LexicalScanner,
    sanitizer: ConfidenceSanitizer,
}

impl UncertaintyAggregator {
    pub fn new(scanner: LexicalScanner) -> Self {
        Self {
            scanner,
            sanitizer: ConfidenceSanitizer::new(),
        }
    }

    /// Uncertainty of a draft in `[0, 1]`.
    pub fn compute(&self, draft: &Draft) -> f64 {
        self.breakdown(draft).combined
    }

    /// Both component scores and their maximum.
    ///
    /// An absent self-report contributes nothing, whereas a present but
    /// malformed one is sanitized to `1.0`.
    pub fn breakdown(&self, draft: &Draft) -> UncertaintyBreakdown {
        let lexical = draft
            .text
            .as_deref()
            .map(|t| self.scanner.scan(t))
            .unwrap_or(0.0);

        let reported = draft
            .self_reported_confidence
            .as_ref()
            .map(|v| self.sanitizer.sanitize(v))
            .unwrap_or(0.0);

        UncertaintyBreakdown {
            lexical,
            reported,
            combined: clamp_unit(lexical.max(reported)),
        }
    }

    pub fn scanner(&self) -> &LexicalScanner {
        &self.scanner
    }
}
