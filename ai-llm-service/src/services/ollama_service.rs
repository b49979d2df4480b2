//! Lightweight Ollama service for chat, embeddings and image description.
//!
//! A minimal, non-streaming client for a local or remote Ollama instance.
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - `POST {endpoint}/api/chat`       — chat completion (with `stream=false`)
//! - `POST {endpoint}/api/embeddings` — embeddings retrieval
//!
//! Validation performed by the constructor:
//! - `cfg.provider` must be [`LlmProvider::Ollama`]
//! - `cfg.endpoint` must start with `http://` or `https://`

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{make_snippet, AiLlmError, Provider},
    services::ChatCall,
};

/// Thin client for the Ollama API.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - [`AiLlmError::InvalidProvider`] if `cfg.provider` is not Ollama
    /// - [`AiLlmError::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(AiLlmError::InvalidProvider);
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(AiLlmError::InvalidEndpoint(cfg.endpoint.clone()));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/api/chat");
        let url_embeddings = format!("{base}/api/embeddings");

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a **non-streaming** chat request via `/api/chat`.
    ///
    /// `format: "json"` is set when the call asks for JSON mode.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, call: ChatCall<'_>) -> Result<String, AiLlmError> {
        let mut messages = Vec::with_capacity(2);
        if !call.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: call.system.to_string(),
                images: None,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: call.user.to_string(),
            images: None,
        });

        let body = ChatRequestBody {
            model: &self.cfg.model,
            messages,
            stream: false,
            format: call.json_mode.then_some("json"),
            options: ChatOptions {
                num_predict: call.max_tokens,
                temperature: call.temperature,
            },
        };

        debug!("POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AiLlmError::HttpStatus {
                provider: Provider::Ollama,
                status,
                snippet: make_snippet(&text),
            });
        }

        let out: ChatResponseBody = resp.json().await.map_err(|e| AiLlmError::Decode {
            provider: Provider::Ollama,
            message: format!("serde error: {e}; ensure `stream=false` is used"),
        })?;
        Ok(out.message.content)
    }

    /// Describes an image by sending it base64-encoded through `/api/chat`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String, AiLlmError> {
        let body = ChatRequestBody {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
                images: Some(vec![STANDARD.encode(image)]),
            }],
            stream: false,
            format: None,
            options: ChatOptions {
                num_predict: self.cfg.max_tokens.unwrap_or(500),
                temperature: self.cfg.temperature.unwrap_or(0.2),
            },
        };

        debug!("POST {} (image)", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AiLlmError::HttpStatus {
                provider: Provider::Ollama,
                status,
                snippet: make_snippet(&text),
            });
        }

        let out: ChatResponseBody = resp.json().await.map_err(|e| AiLlmError::Decode {
            provider: Provider::Ollama,
            message: format!("serde error: {e}"),
        })?;
        Ok(out.message.content)
    }

    /// Retrieves a single embeddings vector via `/api/embeddings`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AiLlmError::HttpStatus {
                provider: Provider::Ollama,
                status,
                snippet: make_snippet(&text),
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| AiLlmError::Decode {
            provider: Provider::Ollama,
            message: format!("serde error: {e}; expected `embedding` array"),
        })?;
        Ok(out.embedding)
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}
