//! Embedding-mode policy: uncertainty ceiling, then drift ceiling.

use std::sync::Arc;

use tracing::debug;

use super::{safety_check, structural_check, Verdict, VerificationPolicy};
use crate::draft::Draft;
use crate::signals::{clamp_ceiling, clamp_unit, CosineDrift, DriftMetric, UncertaintyAggregator};

/// Default ceiling on combined uncertainty.
pub const DEFAULT_UNCERTAINTY_CEILING: f64 = 0.4;

/// Default ceiling on query/draft drift.
pub const DEFAULT_DRIFT_CEILING: f64 = 0.2;

const UNCERTAINTY_CORRECTION: &str = "Remove hedging, state facts or admit ignorance explicitly.";
const DRIFT_CORRECTION: &str = "Stick to the original query intent.";

/// Checks, in order: structural validity, safety markers, uncertainty, drift.
pub struct DriftPolicy {
    aggregator: UncertaintyAggregator,
    metric: Arc<dyn DriftMetric>,
    uncertainty_ceiling: f64,
    drift_ceiling: f64,
}

impl DriftPolicy {
    pub fn new(aggregator: UncertaintyAggregator) -> Self {
        Self {
            aggregator,
            metric: Arc::new(CosineDrift::new()),
            uncertainty_ceiling: DEFAULT_UNCERTAINTY_CEILING,
            drift_ceiling: DEFAULT_DRIFT_CEILING,
        }
    }

    pub fn with_metric(mut self, metric: Arc<dyn DriftMetric>) -> Self {
        self.metric = metric;
        self
    }

    /// Clamped into `[0, 1]`; NaN becomes `0.0`.
    pub fn with_uncertainty_ceiling(mut self, ceiling: f64) -> Self {
        self.uncertainty_ceiling = clamp_ceiling(ceiling);
        self
    }

    /// Clamped into `[0, 1]`; NaN becomes `0.0`.
    pub fn with_drift_ceiling(mut self, ceiling: f64) -> Self {
        self.drift_ceiling = clamp_ceiling(ceiling);
        self
    }

    pub fn uncertainty_ceiling(&self) -> f64 {
        self.uncertainty_ceiling
    }

    pub fn drift_ceiling(&self) -> f64 {
        self.drift_ceiling
    }
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self::new(UncertaintyAggregator::default())
    }
}

impl VerificationPolicy for DriftPolicy {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn requires_embeddings(&self) -> bool {
        true
    }

    fn verify(&self, draft: &Draft, query_embedding: &[f32], draft_embedding: &[f32]) -> Verdict {
        let text = match structural_check(draft) {
            Ok(text) => text,
            Err(verdict) => return verdict,
        };

        if let Err(verdict) = safety_check(self.aggregator.scanner(), text) {
            return verdict;
        }

        let uncertainty = self.aggregator.breakdown(draft);
        debug!(
            lexical = uncertainty.lexical,
            reported = uncertainty.reported,
            score = uncertainty.combined,
            ceiling = self.uncertainty_ceiling,
            "Uncertainty check"
        );
        if uncertainty.combined > self.uncertainty_ceiling {
            return Verdict::retry(
                format!("Uncertainty too high ({:.2})", uncertainty.combined),
                UNCERTAINTY_CORRECTION,
            );
        }

        let drift = clamp_unit(self.metric.distance(query_embedding, draft_embedding));
        debug!(drift, ceiling = self.drift_ceiling, "Drift check");
        if drift > self.drift_ceiling {
            return Verdict::retry(
                format!("Semantic drift detected ({:.2})", drift),
                DRIFT_CORRECTION,
            );
        }

        Verdict::Accepted
    }
}
