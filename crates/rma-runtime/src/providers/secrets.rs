//! API key handling for the OpenAI-compatible backends.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read and only
//! leave the wrapper through [`ApiCredential::expose`], where the bearer
//! header is set. `Debug` and `Display` never print the value.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Config key the endpoint reads its key from.
const API_KEY_FIELD: &str = "api_key";

/// A bearer token for an OpenAI-compatible endpoint.
pub struct ApiCredential {
    value: SecretString,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
        }
    }

    /// `config.api_key` if present, else `env_var`.
    pub fn from_config_or_env(config: &JsonValue, env_var: &str) -> Result<Self, ProviderError> {
        if let Some(value) = config.get(API_KEY_FIELD).and_then(JsonValue::as_str) {
            return Ok(Self::new(value));
        }

        std::env::var(env_var).map(Self::new).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "API key required: set '{}' in config or {} environment variable",
                API_KEY_FIELD, env_var
            ))
        })
    }

    /// The raw key. Call only where the header is built; never store it.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential([REDACTED])")
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
