//! OpenAI-compatible service for chat, embeddings and image description.
//!
//! Targets any endpoint implementing the OpenAI REST shapes:
//! - `POST {endpoint}/v1/chat/completions`
//! - `POST {endpoint}/v1/embeddings`
//!
//! Validation performed by the constructor:
//! - `cfg.provider` must be [`LlmProvider::OpenAi`]
//! - `cfg.endpoint` must start with `http://` or `https://`

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{make_snippet, AiLlmError, Provider},
    services::ChatCall,
};

/// Thin client for OpenAI-style APIs.
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAi {
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
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.cfg.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Performs a chat completion. `response_format` is set to `json_object`
    /// when the call asks for JSON mode.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, call: ChatCall<'_>) -> Result<String, AiLlmError> {
        let mut messages: Vec<Value> = Vec::with_capacity(2);
        if !call.system.is_empty() {
            messages.push(json!({"role": "system", "content": call.system}));
        }
        messages.push(json!({"role": "user", "content": call.user}));

        let mut body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "max_tokens": call.max_tokens,
            "temperature": call.temperature,
        });
        if call.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        self.post_chat(body).await
    }

    /// Describes an image via a data-URL content part.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String, AiLlmError> {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(image));
        let body = json!({
            "model": self.cfg.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}},
                ],
            }],
            "max_tokens": self.cfg.max_tokens.unwrap_or(500),
        });

        self.post_chat(body).await
    }

    async fn post_chat(&self, body: Value) -> Result<String, AiLlmError> {
        debug!("POST {}", self.url_chat);
        let resp = self
            .authorize(self.client.post(&self.url_chat))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AiLlmError::HttpStatus {
                provider: Provider::OpenAi,
                status,
                snippet: make_snippet(&text),
            });
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| AiLlmError::Decode {
            provider: Provider::OpenAi,
            message: format!("serde error: {e}"),
        })?;
        out.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AiLlmError::Decode {
                provider: Provider::OpenAi,
                message: "empty choices array".into(),
            })
    }

    /// Retrieves one embeddings vector per input text, in input order.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .authorize(self.client.post(&self.url_embeddings))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AiLlmError::HttpStatus {
                provider: Provider::OpenAi,
                status,
                snippet: make_snippet(&text),
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| AiLlmError::Decode {
            provider: Provider::OpenAi,
            message: format!("serde error: {e}; expected `data[].embedding`"),
        })?;
        out.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiLlmError::Decode {
                provider: Provider::OpenAi,
                message: "empty embeddings data".into(),
            })
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsDatum {
    embedding: Vec<f32>,
}
