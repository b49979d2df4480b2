//! Default LLM configs loaded strictly from environment variables.
//!
//! Convenience constructors for [`LlmModelConfig`], one per role:
//!
//! - **fast**      → lower-latency chat model (agent evaluation, reranking)
//! - **slow**      → higher-quality chat model (summaries, answers)
//! - **embedding** → embedding generator
//! - **vision**    → image captioning model (optional feature)
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = provider kind (`ollama` or `openai`), default `ollama`
//! - `LLM_MAX_TOKENS` = optional default max tokens (u32)
//! - `LLM_API_KEY` = API key for providers that need one
//! - `LLM_TIMEOUT_SECS` = per-request timeout, default 60
//!
//! Endpoint:
//! - `LLM_URL`, or `OLLAMA_URL`, or `OLLAMA_PORT` → `http://localhost:{port}`
//!
//! Models:
//! - `LLM_MODEL`           = slow/quality chat model (required)
//! - `LLM_MODEL_FAST`      = fast chat model (falls back to `LLM_MODEL`)
//! - `EMBEDDING_MODEL`     = embedding model (required)
//! - `EMBEDDING_TIMEOUT_SECS` = embedding timeout, default 30
//! - `VISION_MODEL`        = vision model (optional; absent disables vision)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{env_opt_u32, must_env, AiLlmError, ConfigError},
};

fn provider_kind() -> Result<LlmProvider, AiLlmError> {
    let kind = std::env::var("LLM_KIND").unwrap_or_else(|_| "ollama".into());
    match kind.trim().to_ascii_lowercase().as_str() {
        "ollama" => Ok(LlmProvider::Ollama),
        "openai" => Ok(LlmProvider::OpenAi),
        other => Err(ConfigError::UnsupportedProvider(other.to_string()).into()),
    }
}

fn endpoint() -> Result<String, AiLlmError> {
    for var in ["LLM_URL", "OLLAMA_URL"] {
        if let Ok(url) = std::env::var(var) {
            if !url.trim().is_empty() {
                return Ok(url);
            }
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let _ = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "LLM_URL, OLLAMA_URL or OLLAMA_PORT",
    )))
}

fn api_key() -> Option<String> {
    std::env::var("LLM_API_KEY").ok().filter(|k| !k.trim().is_empty())
}

fn timeout_secs(var: &'static str, default: u64) -> Result<u64, AiLlmError> {
    Ok(env_opt_u32(var)?.map(u64::from).unwrap_or(default))
}

/// Config for the **slow/quality** chat model.
pub fn config_chat_slow() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: provider_kind()?,
        model: must_env("LLM_MODEL")?,
        endpoint: endpoint()?,
        api_key: api_key(),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: None,
        timeout_secs: Some(timeout_secs("LLM_TIMEOUT_SECS", 60)?),
    })
}

/// Config for the **fast** chat model; falls back to the slow model name.
pub fn config_chat_fast() -> Result<LlmModelConfig, AiLlmError> {
    let model = match std::env::var("LLM_MODEL_FAST") {
        Ok(m) if !m.trim().is_empty() => m,
        _ => must_env("LLM_MODEL")?,
    };
    Ok(LlmModelConfig {
        provider: provider_kind()?,
        model,
        endpoint: endpoint()?,
        api_key: api_key(),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: None,
        timeout_secs: Some(timeout_secs("LLM_TIMEOUT_SECS", 60)?),
    })
}

/// Config for the **embedding** model.
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: provider_kind()?,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint: endpoint()?,
        api_key: api_key(),
        max_tokens: None,
        temperature: None,
        timeout_secs: Some(timeout_secs("EMBEDDING_TIMEOUT_SECS", 30)?),
    })
}

/// Config for the optional **vision** model. `Ok(None)` when `VISION_MODEL`
/// is unset, which disables image description.
pub fn config_vision() -> Result<Option<LlmModelConfig>, AiLlmError> {
    let model = match std::env::var("VISION_MODEL") {
        Ok(m) if !m.trim().is_empty() => m,
        _ => return Ok(None),
    };
    Ok(Some(LlmModelConfig {
        provider: provider_kind()?,
        model,
        endpoint: endpoint()?,
        api_key: api_key(),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: None,
        timeout_secs: Some(timeout_secs("LLM_TIMEOUT_SECS", 60)?),
    }))
}
