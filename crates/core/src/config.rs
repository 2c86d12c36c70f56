//! Completion endpoint configuration read from the environment.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Required: credential for the completion endpoint.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Optional: chat-completions URL.
pub const API_URL_VAR: &str = "REELSCRIPT_API_URL";
/// Optional: model name.
pub const MODEL_VAR: &str = "REELSCRIPT_MODEL";
/// Optional: request timeout in whole seconds. Unset means no timeout.
pub const TIMEOUT_VAR: &str = "REELSCRIPT_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{var} is not set; add it to your environment or a .env file")]
    MissingCredential { var: &'static str },

    #[error("{var} has an invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Clone, PartialEq)]
pub struct EndpointConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl EndpointConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigurationError::MissingCredential { var: API_KEY_VAR })?;
        let request_timeout = match get(TIMEOUT_VAR) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigurationError::InvalidValue { var: TIMEOUT_VAR, value }),
            },
            None => None,
        };

        Ok(Self {
            api_key,
            api_url: get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout,
        })
    }
}
