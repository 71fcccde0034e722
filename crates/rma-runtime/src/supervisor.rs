//! Async supervisor for the bounded self-correction loop.
//!
//! The supervisor owns nothing mutable: every run gets its own
//! [`LoopState`], so one supervisor can drive any number of concurrent runs.
//!
//! Per run:
//! 1. Embed the query once (embedding-mode policies only)
//! 2. Ask the generator for a draft, with the previous correction if any
//! 3. Embed the draft text (embedding-mode policies only)
//! 4. Verify, and let the state machine decide: release, retry or abort
//!
//! Quality rejections are absorbed and recorded. Everything else surfaces as
//! a [`SupervisorError`]: fatal verdicts, exhaustion, backend failures,
//! deadline breaches and cancellation.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use rma_core::{
    AttemptRecord, ConfigError, CorrectionBuilder, Draft, Embedding, KernelConfig, KernelError,
    LoopState, Transition, VerificationPolicy,
};

use crate::cancel::CancellationToken;
use crate::config::RuntimeConfig;
use crate::providers::{DraftGenerator, EmbeddingProvider, GenerationRequest, ProviderError};

/// Backend call a deadline applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStage {
    Generate,
    EmbedQuery,
    EmbedDraft,
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStage::Generate => write!(f, "generate"),
            CallStage::EmbedQuery => write!(f, "embed query"),
            CallStage::EmbedDraft => write!(f, "embed draft"),
        }
    }
}

/// Errors from a supervised run.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Draft rejected fatally on iteration {iteration}: {reason}")]
    FatalRejection { iteration: usize, reason: String },

    #[error("Exceeded max iterations without convergence ({attempts} attempts), last rejection: {last_reason}")]
    Exhausted { attempts: usize, last_reason: String },

    #[error("Generator failed: {0}")]
    Generator(#[source] ProviderError),

    #[error("Embedder failed: {0}")]
    Embedder(#[source] ProviderError),

    #[error("{stage} call exceeded deadline of {timeout:?}")]
    DeadlineExceeded { stage: CallStage, timeout: Duration },

    #[error("Run cancelled before iteration {iteration}")]
    Cancelled { iteration: usize },

    #[error("Supervisor not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl SupervisorError {
    /// A fatal verdict or a deadline breach. Neither is ever retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::FatalRejection { .. } | SupervisorError::DeadlineExceeded { .. }
        )
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, SupervisorError::Exhausted { .. })
    }
}

/// A released draft and how the run got there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub draft: Draft,

    /// Generator calls made, including the accepted one
    pub attempts: usize,

    /// Rejections absorbed before acceptance, in order
    pub rejections: Vec<AttemptRecord>,
}

/// Drives generator, embedder and policy through the bounded loop.
pub struct Supervisor {
    policy: Arc<dyn VerificationPolicy>,
    generator: Arc<dyn DraftGenerator>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    corrections: CorrectionBuilder,
    max_iterations: usize,
    config: RuntimeConfig,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("policy", &self.policy.name())
            .field("generator", &self.generator.name())
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("max_iterations", &self.max_iterations)
            .field("config", &self.config)
            .finish()
    }
}

impl Supervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn policy(&self) -> &dyn VerificationPolicy {
        self.policy.as_ref()
    }

    /// Run until a draft is accepted or the loop gives up.
    pub async fn run(&self, query: &str) -> Result<RunOutcome, SupervisorError> {
        self.run_with_cancel(query, &CancellationToken::new()).await
    }

    /// [`run`](Self::run), checking `cancel` before every generator call.
    pub async fn run_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, SupervisorError> {
        let mut state = LoopState::new(self.max_iterations)?;
        let needs_embeddings = self.policy.requires_embeddings();

        tracing::info!(
            policy = self.policy.name(),
            generator = self.generator.name(),
            max_iterations = self.max_iterations,
            "Starting supervised run"
        );

        let query_embedding = if needs_embeddings {
            self.embed(CallStage::EmbedQuery, query).await?
        } else {
            Embedding::new()
        };

        while let Some(iteration) = state.iteration() {
            if cancel.is_cancelled() {
                tracing::warn!(iteration, "Run cancelled");
                return Err(SupervisorError::Cancelled { iteration });
            }

            let request = GenerationRequest {
                query: query.to_string(),
                instruction: state.instruction().map(str::to_string),
                attempt: iteration,
            };
            let draft = within(
                CallStage::Generate,
                self.config.generate_timeout,
                self.generator.generate(&request),
            )
            .await?
            .map_err(SupervisorError::Generator)?;

            // No text means the structural check rejects before drift is read.
            let draft_embedding = match draft.extractable_text() {
                Some(text) if needs_embeddings => self.embed(CallStage::EmbedDraft, text).await?,
                _ => Embedding::new(),
            };

            let verdict = self.policy.verify(&draft, &query_embedding, &draft_embedding);

            match state.advance(query, &verdict, &self.corrections)? {
                Transition::Accept => {
                    tracing::info!(iteration, attempts = iteration + 1, "Draft accepted");
                    return Ok(RunOutcome {
                        draft,
                        attempts: iteration + 1,
                        rejections: state.into_rejections(),
                    });
                }
                Transition::Retry { .. } => {
                    tracing::warn!(
                        iteration,
                        reason = verdict.reason().unwrap_or_default(),
                        "Draft rejected, retrying with correction"
                    );
                }
                Transition::Fatal { iteration, reason } => {
                    tracing::warn!(iteration, reason = %reason, "Draft rejected fatally");
                    return Err(SupervisorError::FatalRejection { iteration, reason });
                }
                Transition::Exhausted {
                    attempts,
                    last_reason,
                } => {
                    tracing::warn!(attempts, last_reason = %last_reason, "Iteration budget exhausted");
                    return Err(SupervisorError::Exhausted {
                        attempts,
                        last_reason,
                    });
                }
            }
        }

        Err(KernelError::LoopFinished(state.phase()).into())
    }

    async fn embed(&self, stage: CallStage, text: &str) -> Result<Embedding, SupervisorError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| SupervisorError::NotConfigured("embedder".to_string()))?;

        let embedding = within(stage, self.config.embed_timeout, embedder.embed(text))
            .await?
            .map_err(SupervisorError::Embedder)?;

        tracing::debug!(stage = %stage, dimension = embedding.len(), "Embedded text");
        Ok(embedding)
    }
}

async fn within<T>(
    stage: CallStage,
    deadline: Option<Duration>,
    call: impl Future<Output = T>,
) -> Result<T, SupervisorError> {
    match deadline {
        None => Ok(call.await),
        Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
            tracing::warn!(stage = %stage, timeout = ?timeout, "Call exceeded deadline");
            SupervisorError::DeadlineExceeded { stage, timeout }
        }),
    }
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    policy: Option<Arc<dyn VerificationPolicy>>,
    generator: Option<Arc<dyn DraftGenerator>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    corrections: CorrectionBuilder,
    max_iterations: usize,
    config: RuntimeConfig,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            policy: None,
            generator: None,
            embedder: None,
            corrections: CorrectionBuilder::new(),
            max_iterations: rma_core::config::DEFAULT_MAX_ITERATIONS,
            config: RuntimeConfig::default(),
        }
    }

    /// Policy and iteration budget from a kernel config.
    pub fn kernel_config(mut self, config: &KernelConfig) -> Result<Self, SupervisorError> {
        self.policy = Some(config.build_policy()?);
        self.max_iterations = config.max_iterations;
        Ok(self)
    }

    pub fn policy(mut self, policy: Arc<dyn VerificationPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn DraftGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn corrections(mut self, corrections: CorrectionBuilder) -> Self {
        self.corrections = corrections;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let policy = self
            .policy
            .ok_or_else(|| SupervisorError::NotConfigured("policy".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| SupervisorError::NotConfigured("generator".to_string()))?;

        if self.max_iterations == 0 {
            return Err(KernelError::ZeroIterations.into());
        }
        if policy.requires_embeddings() && self.embedder.is_none() {
            return Err(SupervisorError::NotConfigured(format!(
                "policy '{}' requires an embedder",
                policy.name()
            )));
        }

        Ok(Supervisor {
            policy,
            generator,
            embedder: self.embedder,
            corrections: self.corrections,
            max_iterations: self.max_iterations,
            config: self.config,
        })
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FixedEmbedder, ScriptedGenerator};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use rma_core::{Marker, MarkerCategory, PolicyMode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted generator that records every request it sees.
    struct RecordingGenerator {
        script: ScriptedGenerator,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl RecordingGenerator {
        fn new(drafts: Vec<Draft>) -> Arc<Self> {
            Arc::new(Self {
                script: ScriptedGenerator::new(drafts),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, i: usize) -> GenerationRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl DraftGenerator for RecordingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Draft, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script.generate(request).await
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Returns `[1, 0]` for the query and `[0, 1]` for anything else.
    struct OrthogonalEmbedder {
        query: String,
        calls: AtomicUsize,
    }

    impl OrthogonalEmbedder {
        fn new(query: &str) -> Arc<Self> {
            Arc::new(Self {
                query: query.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for OrthogonalEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == self.query {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn name(&self) -> &str {
            "orthogonal"
        }
    }

    /// Counts calls, returns a constant vector.
    #[derive(Default)]
    struct CountingEmbedder {
        texts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct SlowGenerator(Duration);

    #[async_trait]
    impl DraftGenerator for SlowGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Draft, ProviderError> {
            tokio::time::sleep(self.0).await;
            Ok(Draft::with_uncertainty("Paris.", 0.1))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Answers `fast_for` at once and stalls on every other text.
    struct SlowEmbedder {
        fast_for: String,
        delay: Duration,
    }

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
            if text != self.fast_for {
                tokio::time::sleep(self.delay).await;
            }
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct FailingGenerator(AtomicUsize);

    #[async_trait]
    impl DraftGenerator for FailingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Draft, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::HttpError("connection reset".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Cancels its token from inside the first call.
    struct CancellingGenerator(CancellationToken);

    #[async_trait]
    impl DraftGenerator for CancellingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Draft, ProviderError> {
            self.0.cancel();
            Ok(Draft::with_uncertainty("I think maybe", 0.9))
        }

        fn name(&self) -> &str {
            "cancelling"
        }
    }

    fn supervisor(config: &KernelConfig, generator: Arc<dyn DraftGenerator>) -> Supervisor {
        Supervisor::builder()
            .kernel_config(config)
            .unwrap()
            .generator(generator)
            .embedder(Arc::new(FixedEmbedder::default()))
            .build()
            .unwrap()
    }

    const QUERY: &str = "What is the capital of France?";

    #[tokio::test]
    async fn test_clean_draft_accepted_first_try() {
        let generator =
            RecordingGenerator::new(vec![Draft::with_uncertainty("Paris is the capital.", 0.1)]);
        let embedder = Arc::new(CountingEmbedder::default());
        let sup = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(generator.clone())
            .embedder(embedder.clone())
            .build()
            .unwrap();

        let outcome = sup.run(QUERY).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.rejections.is_empty());
        assert_eq!(outcome.draft.text.as_deref(), Some("Paris is the capital."));
        assert_eq!(generator.calls(), 1);
        assert!(generator.request(0).instruction.is_none());

        let texts = embedder.texts.lock().unwrap();
        assert_eq!(*texts, vec![QUERY.to_string(), "Paris is the capital.".to_string()]);
    }

    #[tokio::test]
    async fn test_hedged_draft_corrected() {
        let generator = RecordingGenerator::new(vec![
            Draft::with_uncertainty("I think maybe it is Paris", 0.9),
            Draft::with_uncertainty("Paris is the capital.", 0.1),
        ]);
        let sup = supervisor(&KernelConfig::default(), generator.clone());

        let outcome = sup.run(QUERY).await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].iteration, 0);
        assert_eq!(outcome.rejections[0].reason, "Uncertainty too high (0.90)");

        let second = generator.request(1);
        assert_eq!(second.attempt, 1);
        assert_eq!(second.query, QUERY);
        let instruction = second.instruction.unwrap();
        assert!(instruction.contains("Uncertainty too high (0.90)"));
        assert!(instruction.ends_with(&format!("Original query: {}", QUERY)));
    }

    #[tokio::test]
    async fn test_exhaustion_after_budget() {
        let generator = RecordingGenerator::new(vec![Draft::with_uncertainty("Bad draft", 0.9)]);
        let config = KernelConfig {
            max_iterations: 3,
            ..Default::default()
        };
        let sup = supervisor(&config, generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(err.is_exhausted());
        assert!(matches!(
            err,
            SupervisorError::Exhausted { attempts: 3, ref last_reason } if last_reason == "Uncertainty too high (0.90)"
        ));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_drift_rejected_until_exhausted() {
        let generator =
            RecordingGenerator::new(vec![Draft::with_uncertainty("Bananas are yellow.", 0.0)]);
        let embedder = OrthogonalEmbedder::new(QUERY);
        let sup = Supervisor::builder()
            .kernel_config(&KernelConfig {
                max_iterations: 2,
                ..Default::default()
            })
            .unwrap()
            .generator(generator.clone())
            .embedder(embedder.clone())
            .build()
            .unwrap();

        let err = sup.run(QUERY).await.unwrap_err();
        match err {
            SupervisorError::Exhausted {
                attempts,
                last_reason,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_reason, "Semantic drift detected (1.00)");
            }
            other => panic!("unexpected: {other}"),
        }
        // Query once, draft twice.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert!(generator
            .request(1)
            .instruction
            .unwrap()
            .contains("Stick to the original query intent."));
    }

    #[tokio::test]
    async fn test_missing_output_is_fatal() {
        let generator = RecordingGenerator::new(vec![Draft::from_json(&json!({"uncertainty": 0.1}))]);
        let sup = supervisor(&KernelConfig::default(), generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SupervisorError::FatalRejection { iteration: 0, ref reason } if reason.starts_with("Missing 'output' field")
        ));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_safety_marker_aborts_mid_run() {
        let mut markers = rma_core::signals::default_markers();
        markers.push(Marker::new("mix bleach and ammonia", 1.0, MarkerCategory::Safety));
        let config = KernelConfig {
            markers,
            ..Default::default()
        };

        let generator = RecordingGenerator::new(vec![
            Draft::with_uncertainty("Maybe Paris", 0.9),
            Draft::with_uncertainty("First, mix bleach and ammonia.", 0.0),
            Draft::with_uncertainty("Paris.", 0.0),
        ]);
        let sup = supervisor(&config, generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(matches!(err, SupervisorError::FatalRejection { iteration: 1, .. }));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_heuristic_mode_needs_no_embedder() {
        let generator = RecordingGenerator::new(vec![
            Draft::text("As an AI, I cannot know that."),
            Draft::text("Paris is the capital of France."),
        ]);
        let config = KernelConfig {
            mode: PolicyMode::Heuristic,
            ..Default::default()
        };
        let sup = Supervisor::builder()
            .kernel_config(&config)
            .unwrap()
            .generator(generator.clone())
            .build()
            .unwrap();

        let outcome = sup.run(QUERY).await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.rejections[0].reason.contains("as an ai"));
    }

    #[tokio::test]
    async fn test_demo_script_converges_on_third_draft() {
        let sup = supervisor(
            &KernelConfig::default(),
            Arc::new(ScriptedGenerator::demo("What is the ultimate answer?")),
        );

        let outcome = sup.run("What is the ultimate answer?").await.unwrap();
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.rejections.len(), 2);
        assert!(outcome.draft.text.unwrap().starts_with("The answer is 42."));
    }

    #[tokio::test]
    async fn test_generator_error_not_retried() {
        let generator = Arc::new(FailingGenerator(AtomicUsize::new(0)));
        let sup = supervisor(&KernelConfig::default(), generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Generator(ProviderError::HttpError(_))));
        assert!(!err.is_fatal());
        assert_eq!(generator.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_deadline() {
        let sup = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(Arc::new(SlowGenerator(Duration::from_secs(10))))
            .embedder(Arc::new(FixedEmbedder::default()))
            .runtime_config(RuntimeConfig::default().with_generate_timeout(Duration::from_secs(1)))
            .build()
            .unwrap();

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SupervisorError::DeadlineExceeded {
                stage: CallStage::Generate,
                ..
            }
        ));
    }

    fn slow_embedding_supervisor(
        fast_for: &str,
        generator: Arc<dyn DraftGenerator>,
    ) -> Supervisor {
        Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(generator)
            .embedder(Arc::new(SlowEmbedder {
                fast_for: fast_for.to_string(),
                delay: Duration::from_secs(10),
            }))
            .runtime_config(RuntimeConfig::default().with_embed_timeout(Duration::from_secs(1)))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_embed_deadline() {
        let generator = RecordingGenerator::new(vec![Draft::with_uncertainty("Paris.", 0.1)]);
        let sup = slow_embedding_supervisor("", generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SupervisorError::DeadlineExceeded {
                stage: CallStage::EmbedQuery,
                timeout,
            } if timeout == Duration::from_secs(1)
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_draft_embed_deadline() {
        let generator = RecordingGenerator::new(vec![Draft::with_uncertainty("Paris.", 0.1)]);
        let sup = slow_embedding_supervisor(QUERY, generator.clone());

        let err = sup.run(QUERY).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SupervisorError::DeadlineExceeded {
                stage: CallStage::EmbedDraft,
                ..
            }
        ));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_not_hit_by_fast_calls() {
        let sup = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(Arc::new(SlowGenerator(Duration::from_millis(10))))
            .embedder(Arc::new(FixedEmbedder::default()))
            .runtime_config(RuntimeConfig::default().with_generate_timeout(Duration::from_secs(1)))
            .build()
            .unwrap();

        assert_eq!(sup.run(QUERY).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let generator = RecordingGenerator::new(vec![Draft::with_uncertainty("Paris.", 0.1)]);
        let sup = supervisor(&KernelConfig::default(), generator.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = sup.run_with_cancel(QUERY, &token).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Cancelled { iteration: 0 }));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_between_iterations() {
        let token = CancellationToken::new();
        let sup = supervisor(
            &KernelConfig::default(),
            Arc::new(CancellingGenerator(token.clone())),
        );

        let err = sup.run_with_cancel(QUERY, &token).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Cancelled { iteration: 1 }));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let sup = supervisor(
            &KernelConfig::default(),
            Arc::new(ScriptedGenerator::new(vec![
                Draft::with_uncertainty("Maybe", 0.9),
                Draft::with_uncertainty("Paris.", 0.1),
            ])),
        );

        let (a, b) = tokio::join!(sup.run("first"), sup.run("second"));
        assert_eq!(a.unwrap().attempts, 2);
        assert_eq!(b.unwrap().attempts, 2);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let missing_generator = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .build();
        assert!(matches!(missing_generator, Err(SupervisorError::NotConfigured(_))));

        let missing_embedder = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(Arc::new(ScriptedGenerator::demo("q")))
            .build();
        assert!(matches!(missing_embedder, Err(SupervisorError::NotConfigured(_))));

        let zero = Supervisor::builder()
            .kernel_config(&KernelConfig::default())
            .unwrap()
            .generator(Arc::new(ScriptedGenerator::demo("q")))
            .embedder(Arc::new(FixedEmbedder::default()))
            .max_iterations(0)
            .build();
        assert!(matches!(zero, Err(SupervisorError::Kernel(KernelError::ZeroIterations))));
    }

    proptest! {
        #[test]
        fn generator_calls_bounded_by_budget(
            max in 1usize..8,
            script in prop::collection::vec(any::<bool>(), 1..10),
        ) {
            let drafts: Vec<Draft> = script
                .iter()
                .map(|good| if *good {
                    Draft::with_uncertainty("Paris.", 0.1)
                } else {
                    Draft::with_uncertainty("Bad draft", 0.9)
                })
                .collect();
            let generator = RecordingGenerator::new(drafts);
            let config = KernelConfig { max_iterations: max, ..Default::default() };
            let sup = supervisor(&config, generator.clone());

            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let result = rt.block_on(sup.run(QUERY));

            prop_assert!(generator.calls() <= max);

            // Past the script's end the last draft repeats.
            let first_good = (0..max).find(|i| script[(*i).min(script.len() - 1)]);
            match (first_good, result) {
                (Some(i), Ok(outcome)) => {
                    prop_assert_eq!(outcome.attempts, i + 1);
                    prop_assert_eq!(outcome.rejections.len(), i);
                }
                (None, Err(SupervisorError::Exhausted { attempts, .. })) => {
                    prop_assert_eq!(attempts, max);
                }
                (expected, other) => prop_assert!(false, "expected {:?}, got {:?}", expected, other),
            }
        }
    }
}
