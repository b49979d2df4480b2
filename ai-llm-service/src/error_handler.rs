//! Error types for `ai-llm-service` configuration and runtime.

use reqwest::StatusCode;
use thiserror::Error;

use doc_base::PortError;

/// Convenient result alias for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Minimal error enum for environment/config-driven setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND`.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// Which backend produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

/// Unified runtime error for this crate.
#[derive(Debug, Error)]
pub enum AiLlmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Client/network failure before an HTTP status was obtained.
    #[error("http transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Non-2xx HTTP response from a provider.
    #[error("{provider:?} returned {status}: {snippet}")]
    HttpStatus {
        provider: Provider,
        status: StatusCode,
        snippet: String,
    },

    /// Response body could not be decoded into the expected shape.
    #[error("{provider:?} response decode failed: {message}")]
    Decode { provider: Provider, message: String },

    /// Endpoint string failed validation at construction time.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Config handed to the wrong provider client.
    #[error("config provider does not match service provider")]
    InvalidProvider,
}

impl AiLlmError {
    /// True when a retry may succeed: network failures, timeouts, 5xx and
    /// 429 responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiLlmError::HttpTransport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AiLlmError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// True for an explicit rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            AiLlmError::HttpStatus {
                status: StatusCode::TOO_MANY_REQUESTS,
                ..
            }
        )
    }
}

impl From<AiLlmError> for PortError {
    fn from(err: AiLlmError) -> Self {
        match &err {
            AiLlmError::Config(_) | AiLlmError::InvalidEndpoint(_) | AiLlmError::InvalidProvider => {
                PortError::Config(err.to_string())
            }
            AiLlmError::Decode { .. } => PortError::Schema(err.to_string()),
            _ if err.is_rate_limited() => PortError::RateLimited(err.to_string()),
            _ => PortError::Transient(err.to_string()),
        }
    }
}

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> ConfigResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
pub fn env_opt_u32(name: &'static str) -> ConfigResult<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<u32>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u32",
                })
        }
        _ => Ok(None),
    }
}

/// Truncates a response body for error messages.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
