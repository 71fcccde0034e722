//! Backend abstractions for rma-runtime.
//!
//! The supervisor talks to two collaborators: a [`DraftGenerator`] that
//! produces drafts and an [`EmbeddingProvider`] that turns text into vectors.
//! This module defines both traits and ships deterministic test doubles plus
//! OpenAI-compatible adapters whose network calls sit behind the `openai`
//! feature.
//!
//! ## Security
//!
//! Networked adapters keep API keys in [`ApiCredential`]; see [`secrets`].

use async_trait::async_trait;
use rma_core::{Draft, Embedding};
use std::time::Duration;
use thiserror::Error;

mod openai;
pub mod scripted;
pub mod secrets;

pub use scripted::{FixedEmbedder, HashEmbedder, ScriptedGenerator};
pub use secrets::ApiCredential;
pub use openai::{OpenAiEmbedder, OpenAiGenerator, OPENAI_API_KEY_ENV};

/// Errors from generator and embedding backends.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Everything a generator needs for one attempt.
///
/// The attempt index is passed in rather than counted by the generator, so
/// generators stay stateless and runs stay independent.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The original query, unchanged across attempts
    pub query: String,

    /// Correction instruction from the previous rejection (none on attempt 0)
    pub instruction: Option<String>,

    /// 0-based attempt index
    pub attempt: usize,
}

impl GenerationRequest {
    pub fn first(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            instruction: None,
            attempt: 0,
        }
    }
}

/// Produces drafts.
///
/// Failures are the generator's own concern; the supervisor propagates them
/// and never retries them.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Draft, ProviderError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Turns text into a vector.
///
/// Zero-length or zero-norm output is allowed; the drift metric treats it
/// as maximal drift.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}
