//! Verification policies.
//!
//! A policy turns one draft into one verdict by running an ordered,
//! short-circuiting chain of checks. Two backends implement the same
//! contract and are selected by configuration:
//!
//! - [`DriftPolicy`]: structural → uncertainty ceiling → drift ceiling
//! - [`HeuristicPolicy`]: structural → lexical markers → charter rules
//!
//! Both share the structural check and the fatal/retryable distinction.

mod charter;
mod drift;
mod heuristic;

pub use charter::{CharterEvaluator, CharterRule, NoSemanticChecks};
pub use drift::{DriftPolicy, DEFAULT_DRIFT_CEILING, DEFAULT_UNCERTAINTY_CEILING};
pub use heuristic::HeuristicPolicy;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::draft::Draft;
use crate::signals::{LexicalScanner, MarkerCategory};

/// Which policy backend a kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Uncertainty and drift thresholds; needs an embedder
    #[default]
    Embedding,
    /// Lexical markers and charter rules only
    Heuristic,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Embedding => write!(f, "embedding"),
            PolicyMode::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Outcome of verifying one draft.
///
/// The three states are mutually exclusive by construction: a fatal verdict
/// is never accepted, and only a retryable rejection carries a correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Release the draft.
    Accepted,

    /// Reject and try again with a correction.
    Retry {
        /// Why the draft was rejected
        reason: String,
        /// Directive for the next attempt
        correction: String,
    },

    /// Abort the run; retrying blindly will not help.
    Fatal {
        /// Why the draft was rejected
        reason: String,
    },
}

impl Verdict {
    pub fn retry(reason: impl Into<String>, correction: impl Into<String>) -> Self {
        Verdict::Retry {
            reason: reason.into(),
            correction: correction.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Verdict::Fatal {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Verdict::Fatal { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Verdict::Retry { .. })
    }

    /// Rejection reason; present iff not accepted.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Accepted => None,
            Verdict::Retry { reason, .. } | Verdict::Fatal { reason } => Some(reason),
        }
    }

    /// Correction directive; present iff the rejection is retryable.
    pub fn correction_instruction(&self) -> Option<&str> {
        match self {
            Verdict::Retry { correction, .. } => Some(correction),
            _ => None,
        }
    }
}

/// A verification backend.
///
/// Implementations are immutable after construction and safe to share
/// across concurrent runs.
pub trait VerificationPolicy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the supervisor must embed the query and each draft.
    fn requires_embeddings(&self) -> bool;

    /// Verify one draft. Embeddings are empty slices when the policy does
    /// not require them.
    fn verify(&self, draft: &Draft, query_embedding: &[f32], draft_embedding: &[f32]) -> Verdict;
}

const FORMAT_CORRECTION: &str = "Format as JSON with 'output' field";

/// Shared first check: the draft must carry non-empty text.
///
/// A missing or blank output is a protocol violation, not a quality
/// problem, so it is fatal.
pub(crate) fn structural_check(draft: &Draft) -> Result<&str, Verdict> {
    match draft.text.as_deref() {
        None => Err(Verdict::fatal(format!(
            "Missing 'output' field ({})",
            FORMAT_CORRECTION
        ))),
        Some(_) => draft
            .extractable_text()
            .ok_or_else(|| Verdict::fatal(format!("Empty 'output' field ({})", FORMAT_CORRECTION))),
    }
}

/// Safety-category markers abort the run in either backend.
pub(crate) fn safety_check(scanner: &LexicalScanner, text: &str) -> Result<(), Verdict> {
    match scanner.strongest_in(text, MarkerCategory::Safety) {
        Some(m) => Err(Verdict::fatal(format!(
            "Safety marker detected: '{}' ({:.2})",
            m.phrase, m.weight
        ))),
        None => Ok(()),
    }
}
