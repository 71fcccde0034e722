//! # rma-runtime
//!
//! Drives the `rma-core` kernel against real collaborators.
//!
//! `rma-core` decides; this crate does the calling. It owns everything that
//! touches a backend or a clock:
//! - [`Supervisor`]: the async bounded-retry loop
//! - [`DraftGenerator`] / [`EmbeddingProvider`]: collaborator traits
//! - [`RuntimeConfig`]: per-call deadlines
//! - [`CancellationToken`]: cooperative stop between attempts
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rma_core::KernelConfig;
//! use rma_runtime::{HashEmbedder, ScriptedGenerator, Supervisor};
//!
//! let supervisor = Supervisor::builder()
//!     .kernel_config(&KernelConfig::from_yaml_file("rma.yaml")?)?
//!     .generator(Arc::new(ScriptedGenerator::demo("What is the answer?")))
//!     .embedder(Arc::new(HashEmbedder::default()))
//!     .build()?;
//!
//! let outcome = supervisor.run("What is the answer?").await?;
//! println!("accepted after {} attempts", outcome.attempts);
//! ```

pub mod cancel;
pub mod config;
pub mod providers;
pub mod supervisor;

pub use cancel::CancellationToken;
pub use config::{parse_duration, RuntimeConfig, RuntimeConfigError};
pub use providers::{
    ApiCredential, DraftGenerator, EmbeddingProvider, FixedEmbedder, GenerationRequest,
    HashEmbedder, OpenAiEmbedder, OpenAiGenerator, ProviderError, ScriptedGenerator,
};
pub use supervisor::{CallStage, RunOutcome, Supervisor, SupervisorBuilder, SupervisorError};
