//! Semantic drift between the query and a draft.

/// Distance between a query vector and a draft vector.
///
/// Implementations return roughly `[0, 1]`; callers still clamp before
/// comparing against a threshold.
pub trait DriftMetric: Send + Sync {
    fn distance(&self, query: &[f32], draft: &[f32]) -> f64;
}

/// Cosine distance, `1 - cos(query, draft)`.
///
/// Undefined similarity is maximal drift: empty vectors, zero-norm vectors
/// and mismatched dimensions all return `1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineDrift;

impl CosineDrift {
    pub fn new() -> Self {
        Self
    }
}

impl DriftMetric for CosineDrift {
    fn distance(&self, query: &[f32], draft: &[f32]) -> f64 {
        if query.is_empty() || draft.is_empty() || query.len() != draft.len() {
            return 1.0;
        }

        let mut dot = 0.0_f64;
        let mut nq = 0.0_f64;
        let mut nd = 0.0_f64;
        for (q, d) in query.iter().zip(draft) {
            let (q, d) = (f64::from(*q), f64::from(*d));
            dot += q * d;
            nq += q * q;
            nd += d * d;
        }

        if nq == 0.0 || nd == 0.0 {
            return 1.0;
        }

        let distance = 1.0 - dot / (nq.sqrt() * nd.sqrt());
        if distance.is_finite() {
            distance
        } else {
            1.0
        }
    }
}
