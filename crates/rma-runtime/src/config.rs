//! Runtime deadlines.
//!
//! Durations are written the human way (`"30s"`, `"1m 30s"`, `"250ms"`).
//! An absent deadline means the call may take as long as it likes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeConfigError {
    #[error("Invalid duration '{input}': {source}")]
    Duration {
        input: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Failed to parse runtime config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-call deadlines for the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Deadline for one generator call
    #[serde(default, with = "opt_duration", skip_serializing_if = "Option::is_none")]
    pub generate_timeout: Option<Duration>,

    /// Deadline for one embedding call
    #[serde(default, with = "opt_duration", skip_serializing_if = "Option::is_none")]
    pub embed_timeout: Option<Duration>,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, RuntimeConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(timeout);
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }
}

/// Parse a human-readable duration such as `"30s"` or `"2m"`.
pub fn parse_duration(input: &str) -> Result<Duration, RuntimeConfigError> {
    humantime::parse_duration(input.trim()).map_err(|source| RuntimeConfigError::Duration {
        input: input.to_string(),
        source,
    })
}

mod opt_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => humantime::parse_duration(s.trim())
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid duration '{}': {}", s, e))),
            None => Ok(None),
        }
    }
}
