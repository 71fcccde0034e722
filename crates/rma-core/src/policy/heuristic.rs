//! Heuristic-mode policy: no embeddings, lexical markers then charter rules.

use std::sync::Arc;

use tracing::debug;

use super::{
    safety_check, structural_check, CharterEvaluator, CharterRule, NoSemanticChecks, Verdict,
    VerificationPolicy,
};
use crate::draft::Draft;
use crate::signals::{clamp_ceiling, clamp_unit, LexicalScanner, MarkerCategory};

/// Checks, in order: structural validity, lexical markers, charter rules.
///
/// Any marker match rejects the draft. With the default evaluator the
/// charter has no semantic checks, so a clean lexical scan is accepted.
pub struct HeuristicPolicy {
    scanner: LexicalScanner,
    charter: Vec<CharterRule>,
    evaluator: Arc<dyn CharterEvaluator>,
}

impl HeuristicPolicy {
    pub fn new(scanner: LexicalScanner, charter: Vec<CharterRule>) -> Self {
        Self {
            scanner,
            charter,
            evaluator: Arc::new(NoSemanticChecks),
        }
    }

    /// Use a custom charter evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn CharterEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn charter(&self) -> &[CharterRule] {
        &self.charter
    }

    fn correction_for(category: MarkerCategory) -> &'static str {
        match category {
            MarkerCategory::Refusal => "Remove boilerplate refusal language and answer directly.",
            MarkerCategory::Hedge => "Remove hedging, state facts or admit ignorance explicitly.",
            MarkerCategory::Filler => "Remove filler and keep only content that answers the query.",
            MarkerCategory::Safety => "Remove disallowed content.",
        }
    }
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self::new(LexicalScanner::default(), Vec::new())
    }
}

impl VerificationPolicy for HeuristicPolicy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn requires_embeddings(&self) -> bool {
        false
    }

    fn verify(&self, draft: &Draft, _query_embedding: &[f32], _draft_embedding: &[f32]) -> Verdict {
        let text = match structural_check(draft) {
            Ok(text) => text,
            Err(verdict) => return verdict,
        };

        if let Err(verdict) = safety_check(&self.scanner, text) {
            return verdict;
        }

        if let Some(found) = self.scanner.strongest(text) {
            debug!(
                marker = %found.phrase,
                category = %found.category,
                weight = found.weight,
                offset = found.offset,
                "Lexical marker matched"
            );
            return Verdict::retry(
                format!(
                    "Lexical marker detected: '{}' ({}, {:.2})",
                    found.phrase, found.category, found.weight
                ),
                Self::correction_for(found.category),
            );
        }

        for rule in &self.charter {
            let Some(score) = self.evaluator.score(rule, text) else {
                continue;
            };
            let score = clamp_unit(score);
            // Rules built as struct literals bypass `with_threshold`.
            let threshold = clamp_ceiling(rule.threshold);
            debug!(rule_id = %rule.rule_id, score, threshold, "Charter rule scored");

            if score > threshold {
                return Verdict::retry(
                    format!(
                        "Charter rule {} violated ({:.2} > {:.2}): {}",
                        rule.rule_id, score, threshold, rule.description
                    ),
                    format!("Comply with rule {}: {}", rule.rule_id, rule.description),
                );
            }
        }

        Verdict::Accepted
    }
}
