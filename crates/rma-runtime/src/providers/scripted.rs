//! Deterministic backends for tests, demos and offline runs.

use async_trait::async_trait;
use rma_core::{Draft, Embedding};
use serde_json::Value as JsonValue;

use super::{DraftGenerator, EmbeddingProvider, GenerationRequest, ProviderError};

/// Replays a fixed sequence of drafts.
///
/// Attempt `n` returns draft `n`; once the script runs out the last draft is
/// repeated. The attempt index comes from the request, so the generator has
/// no internal counter and can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    drafts: Vec<Draft>,
}

impl ScriptedGenerator {
    pub fn new(drafts: Vec<Draft>) -> Self {
        Self { drafts }
    }

    /// Build from wire-format objects (`{"output": ..., "uncertainty": ...}`).
    pub fn from_json(values: &[JsonValue]) -> Self {
        Self::new(values.iter().map(Draft::from_json).collect())
    }

    /// A hallucination, then a boilerplate refusal, then a clean answer,
    /// then an answer that restates the query.
    pub fn demo(query: &str) -> Self {
        Self::new(vec![
            Draft::with_uncertainty("I think the answer might be 42, but I'm not sure...", 0.8),
            Draft::with_uncertainty(
                "As an AI language model, I cannot answer this question directly.",
                0.1,
            ),
            Draft::with_uncertainty(
                "The answer is 42. This is a calculated fact based on the input parameters.",
                0.05,
            ),
            Draft::with_uncertainty(
                format!("Regarding your query '{}': The ultimate answer is 42.", query),
                0.01,
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

#[async_trait]
impl DraftGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Draft, ProviderError> {
        self.drafts
            .get(request.attempt)
            .or_else(|| self.drafts.last())
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured("Scripted generator has no drafts".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Returns the same vector for every input.
///
/// Query and draft embeddings are always identical, so drift is zero unless
/// the vector itself is degenerate.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    vector: Embedding,
}

impl FixedEmbedder {
    pub fn new(vector: Embedding) -> Self {
        Self { vector }
    }
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self::new(vec![0.1, 0.2, 0.3])
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding, ProviderError> {
        Ok(self.vector.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Cheap deterministic embedding derived from the text's code points.
///
/// Not semantic in any way; it only guarantees that identical text maps to
/// identical unit vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Synchronous form of [`EmbeddingProvider::embed`].
    pub fn vector(&self, text: &str) -> Embedding {
        let seed: u64 = text.chars().map(|c| u64::from(c)).sum();

        let raw: Vec<f32> = (0..self.dimension as u64)
            .map(|i| (seed.wrapping_mul(i + 1) % 100) as f32 / 100.0)
            .collect();

        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            raw.into_iter().map(|x| x / norm).collect()
        } else {
            raw
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        Ok(self.vector(text))
    }

    fn name(&self) -> &str {
        "hash"
    }
}
