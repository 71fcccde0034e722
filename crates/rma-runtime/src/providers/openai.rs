//! OpenAI-compatible chat and embedding backends.
//!
//! Any endpoint that speaks the `/chat/completions` and `/embeddings` wire
//! formats works; point `base_url` at it. Requests only go out when the
//! `openai` feature is enabled. Without it both adapters construct fine but
//! every call returns [`ProviderError::NotConfigured`].

use async_trait::async_trait;
use rma_core::{Draft, Embedding};
#[cfg(feature = "openai")]
use serde::Deserialize;
#[cfg(any(feature = "openai", test))]
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{
    secrets::ApiCredential, DraftGenerator, EmbeddingProvider, GenerationRequest, ProviderError,
};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoint settings shared by both adapters.
#[derive(Debug)]
#[cfg_attr(not(feature = "openai"), allow(dead_code))] // Fields are only read by the HTTP path
struct Endpoint {
    credential: ApiCredential,
    base_url: String,
    model: String,
    timeout: Duration,
}

/// Require an http(s) scheme and drop trailing slashes.
fn normalize_base_url(url: &str) -> Result<String, ProviderError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ProviderError::NotConfigured(format!(
            "base_url must start with http:// or https://, got '{}'",
            url
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Endpoint {
    fn new(api_key: impl Into<String>, model: &str) -> Self {
        Self {
            credential: ApiCredential::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Reads `api_key`, `base_url`, `model` and `timeout_secs` from `config`.
    fn from_config(config: &JsonValue, default_model: &str) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(config, OPENAI_API_KEY_ENV)?;
        let base_url = normalize_base_url(
            config
                .get("base_url")
                .and_then(JsonValue::as_str)
                .unwrap_or(DEFAULT_BASE_URL),
        )?;

        Ok(Self {
            credential,
            base_url,
            model: config
                .get("model")
                .and_then(JsonValue::as_str)
                .unwrap_or(default_model)
                .to_string(),
            timeout: config
                .get("timeout_secs")
                .and_then(JsonValue::as_u64)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        })
    }

    fn set_base_url(&mut self, url: &str) -> Result<(), ProviderError> {
        self.base_url = normalize_base_url(url)?;
        Ok(())
    }

    #[cfg(feature = "openai")]
    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ProviderError> {
        static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
        let client = CLIENT.get_or_init(reqwest::Client::new);

        let response = client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(self.credential.expose())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[cfg(any(feature = "openai", test))]
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[cfg(any(feature = "openai", test))]
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(feature = "openai")]
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Embedding,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[cfg(feature = "openai")]
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Chat-completion draft generator.
///
/// The correction instruction travels as a system message after the user
/// query. Chat endpoints report no confidence, so drafts carry none and only
/// the lexical scan contributes to uncertainty.
#[derive(Debug)]
pub struct OpenAiGenerator {
    endpoint: Endpoint,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(api_key, DEFAULT_CHAT_MODEL),
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_config(&JsonValue::Null)
    }

    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::from_config(config, DEFAULT_CHAT_MODEL)?,
        })
    }

    /// Point at another OpenAI-compatible server. Must be http(s).
    pub fn with_base_url(mut self, url: &str) -> Result<Self, ProviderError> {
        self.endpoint.set_base_url(url)?;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.endpoint.model = model.into();
        self
    }

    #[cfg(any(feature = "openai", test))]
    fn messages<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        let mut messages = vec![ChatMessage {
            role: "user",
            content: request.query.as_str().into(),
        }];
        if let Some(instruction) = &request.instruction {
            messages.push(ChatMessage {
                role: "system",
                content: format!("Correction Instruction: {}", instruction).into(),
            });
        }

        ChatRequest {
            model: &self.endpoint.model,
            messages,
        }
    }
}

#[async_trait]
impl DraftGenerator for OpenAiGenerator {
    #[cfg(feature = "openai")]
    async fn generate(&self, request: &GenerationRequest) -> Result<Draft, ProviderError> {
        let body: ChatResponse = self
            .endpoint
            .post("chat/completions", &self.messages(request))
            .await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        Ok(Draft {
            text: content,
            self_reported_confidence: None,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(&self, _request: &GenerationRequest) -> Result<Draft, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenAI generator requires 'openai' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// `/embeddings` client.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    endpoint: Endpoint,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(api_key, DEFAULT_EMBEDDING_MODEL),
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_config(&JsonValue::Null)
    }

    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::from_config(config, DEFAULT_EMBEDDING_MODEL)?,
        })
    }

    /// Point at another OpenAI-compatible server. Must be http(s).
    pub fn with_base_url(mut self, url: &str) -> Result<Self, ProviderError> {
        self.endpoint.set_base_url(url)?;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.endpoint.model = model.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    #[cfg(feature = "openai")]
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.endpoint.model,
            input: text,
        };
        let body: EmbeddingResponse = self.endpoint.post("embeddings", &request).await?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::ParseError("Empty embedding response".to_string()))
    }

    #[cfg(not(feature = "openai"))]
    async fn embed(&self, _text: &str) -> Result<Embedding, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenAI embedder requires 'openai' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
