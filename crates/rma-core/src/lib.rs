//! # rma-core
//!
//! Deterministic verification-and-correction kernel for generated text.
//!
//! This crate decides, for one draft at a time, whether a generator's output
//! is released, sent back with a correction, or rejected outright:
//! - **Signals**: lexical markers, sanitized self-reported confidence, drift
//! - **Policies**: two interchangeable backends behind [`VerificationPolicy`]
//! - **Correction**: the steering instruction for the next attempt
//! - **Loop state**: the bounded-retry state machine
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same draft and embeddings always give the same verdict
//! 2. **No backend calls**: generation and embedding live in `rma-runtime`
//! 3. **Fail-closed**: malformed signals score as the worst case
//! 4. **Worst-case aggregation**: signals combine by maximum, never by average
//!
//! ## Example
//!
//! ```rust,ignore
//! use rma_core::{Draft, KernelConfig, Verdict};
//!
//! let config = KernelConfig::from_yaml_file("rma.yaml")?;
//! let policy = config.build_policy()?;
//! let draft = Draft::with_uncertainty("The answer is 4.", 0.1);
//!
//! match policy.verify(&draft, &query_vec, &draft_vec) {
//!     Verdict::Accepted => println!("release"),
//!     Verdict::Retry { reason, .. } => println!("retry: {}", reason),
//!     Verdict::Fatal { reason } => println!("abort: {}", reason),
//! }
//! ```

pub mod config;
pub mod correction;
pub mod draft;
pub mod loop_state;
pub mod policy;
pub mod signals;

// Re-export main types at crate root
pub use config::{ConfigError, KernelConfig};
pub use correction::CorrectionBuilder;
pub use draft::{Draft, Embedding};
pub use loop_state::{AttemptRecord, LoopPhase, LoopState, Transition};
pub use policy::{
    CharterEvaluator, CharterRule, DriftPolicy, HeuristicPolicy, NoSemanticChecks, PolicyMode,
    Verdict, VerificationPolicy,
};
pub use signals::{
    ConfidenceSanitizer, CosineDrift, DriftMetric, LexicalScanner, Marker, MarkerCategory,
    UncertaintyAggregator,
};

use thiserror::Error;

/// Errors from the kernel.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("Loop already finished in state {0}")]
    LoopFinished(LoopPhase),
}
