//! `rma` command-line entry point.
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value as JsonValue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rma_core::signals::UncertaintyAggregator;
use rma_core::{Draft, KernelConfig, PolicyMode};
use rma_runtime::{
    parse_duration, DraftGenerator, EmbeddingProvider, FixedEmbedder, HashEmbedder, RuntimeConfig,
    ScriptedGenerator, Supervisor, SupervisorError,
};

#[derive(Parser, Debug)]
#[command(name = "rma", version, about = "Bounded verification-and-correction loop for generated drafts")]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a kernel config file
    Validate {
        /// YAML or JSON config
        #[arg(long)]
        config: PathBuf,
    },
    /// Verify a single draft without looping
    Check {
        /// Draft as JSON: {"output": ..., "uncertainty": ...}
        #[arg(long)]
        draft: PathBuf,
        /// Query the draft answers (needed for drift in embedding mode)
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured policy backend
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        #[arg(long, value_enum, default_value_t = Embedder::Fixed)]
        embedder: Embedder,
    },
    /// Run the full loop against a draft script (the built-in demo by default)
    Run {
        #[arg(long)]
        query: String,
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON array of drafts; attempt n replays entry n, then the last
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        #[arg(long, value_enum, default_value_t = Embedder::Fixed)]
        embedder: Embedder,
        /// Generate through an OpenAI-compatible chat endpoint instead of a script
        #[cfg(feature = "openai")]
        #[arg(long, conflicts_with = "script")]
        openai: bool,
        /// Per-call generator deadline, e.g. "30s"
        #[arg(long, value_parser = parse_duration)]
        generate_timeout: Option<std::time::Duration>,
        /// Per-call embedding deadline, e.g. "5s"
        #[arg(long, value_parser = parse_duration)]
        embed_timeout: Option<std::time::Duration>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Embedding,
    Heuristic,
}

impl From<Mode> for PolicyMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Embedding => PolicyMode::Embedding,
            Mode::Heuristic => PolicyMode::Heuristic,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Embedder {
    /// Same vector for every text (drift is always zero)
    Fixed,
    /// Deterministic code-point hash
    Hash,
    /// OpenAI-compatible /embeddings endpoint
    #[cfg(feature = "openai")]
    Openai,
}

impl Embedder {
    fn build(self) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(match self {
            Embedder::Fixed => Arc::new(FixedEmbedder::default()),
            Embedder::Hash => Arc::new(HashEmbedder::default()),
            #[cfg(feature = "openai")]
            Embedder::Openai => Arc::new(rma_runtime::OpenAiEmbedder::from_env()?),
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Check {
            draft,
            query,
            config,
            mode,
            embedder,
        } => check(&draft, &query, config.as_deref(), mode, embedder).await,
        Commands::Run {
            query,
            config,
            script,
            mode,
            embedder,
            #[cfg(feature = "openai")]
            openai,
            generate_timeout,
            embed_timeout,
        } => {
            let kernel = load_config(config.as_deref(), mode)?;

            #[cfg(feature = "openai")]
            let generator: Arc<dyn DraftGenerator> = if openai {
                Arc::new(rma_runtime::OpenAiGenerator::from_env()?)
            } else {
                scripted_generator(script.as_deref(), &query)?
            };
            #[cfg(not(feature = "openai"))]
            let generator = scripted_generator(script.as_deref(), &query)?;

            let runtime = RuntimeConfig {
                generate_timeout,
                embed_timeout,
            };
            run(&query, &kernel, generator, embedder, runtime).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Defaults when no path is given; `.json` files parse as JSON, anything else as YAML.
fn load_config(path: Option<&Path>, mode: Option<Mode>) -> Result<KernelConfig> {
    let mut config = match path {
        None => KernelConfig::default(),
        Some(p) if p.extension().is_some_and(|ext| ext == "json") => KernelConfig::from_json_file(p)
            .with_context(|| format!("loading {}", p.display()))?,
        Some(p) => KernelConfig::from_yaml_file(p)
            .with_context(|| format!("loading {}", p.display()))?,
    };

    if let Some(mode) = mode {
        config.mode = mode.into();
    }
    tracing::debug!(
        path = ?path,
        mode = ?config.mode,
        max_iterations = config.max_iterations,
        "Kernel config loaded"
    );
    Ok(config)
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn scripted_generator(path: Option<&Path>, query: &str) -> Result<Arc<dyn DraftGenerator>> {
    let Some(path) = path else {
        return Ok(Arc::new(ScriptedGenerator::demo(query)));
    };

    let JsonValue::Array(drafts) = read_json(path)? else {
        bail!("{}: draft script must be a JSON array", path.display());
    };
    if drafts.is_empty() {
        bail!("{}: draft script is empty", path.display());
    }
    Ok(Arc::new(ScriptedGenerator::from_json(&drafts)))
}

fn validate(path: &Path) -> Result<ExitCode> {
    let config = load_config(Some(path), None)?;
    print_json(&json!({
        "valid": true,
        "mode": config.mode,
        "max_iterations": config.max_iterations,
        "uncertainty_ceiling": config.uncertainty_ceiling,
        "drift_ceiling": config.drift_ceiling,
        "markers": config.markers.len(),
        "charter_rules": config.charter.len(),
    }))?;
    Ok(ExitCode::SUCCESS)
}

async fn check(
    draft_path: &Path,
    query: &str,
    config_path: Option<&Path>,
    mode: Option<Mode>,
    embedder: Embedder,
) -> Result<ExitCode> {
    let config = load_config(config_path, mode)?;
    let policy = config.build_policy()?;
    let draft = Draft::from_json(&read_json(draft_path)?);

    let (query_embedding, draft_embedding) = if policy.requires_embeddings() {
        let embedder = embedder.build()?;
        let text = draft.extractable_text().unwrap_or_default();
        (embedder.embed(query).await?, embedder.embed(text).await?)
    } else {
        (Vec::new(), Vec::new())
    };

    let verdict = policy.verify(&draft, &query_embedding, &draft_embedding);
    let uncertainty = UncertaintyAggregator::new(config.scanner()?).breakdown(&draft);

    print_json(&json!({
        "policy": policy.name(),
        "verdict": &verdict,
        "uncertainty": uncertainty,
    }))?;

    Ok(if verdict.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

async fn run(
    query: &str,
    config: &KernelConfig,
    generator: Arc<dyn DraftGenerator>,
    embedder: Embedder,
    runtime: RuntimeConfig,
) -> Result<ExitCode> {
    let mut builder = Supervisor::builder()
        .kernel_config(config)?
        .generator(generator)
        .runtime_config(runtime);
    if config.mode == PolicyMode::Embedding {
        builder = builder.embedder(embedder.build()?);
    }
    let supervisor = builder.build()?;

    match supervisor.run(query).await {
        Ok(outcome) => {
            print_json(&json!({
                "status": "accepted",
                "outcome": outcome,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(error = %err, "Run did not release a draft");
            print_json(&json!({
                "status": failure_status(&err),
                "error": err.to_string(),
            }))?;
            Ok(ExitCode::from(2))
        }
    }
}

fn failure_status(err: &SupervisorError) -> &'static str {
    match err {
        SupervisorError::FatalRejection { .. } => "fatal",
        SupervisorError::Exhausted { .. } => "exhausted",
        SupervisorError::DeadlineExceeded { .. } => "deadline_exceeded",
        SupervisorError::Cancelled { .. } => "cancelled",
        SupervisorError::Generator(_) | SupervisorError::Embedder(_) => "backend_error",
        SupervisorError::NotConfigured(_)
        | SupervisorError::Config(_)
        | SupervisorError::Kernel(_) => "error",
    }
}
