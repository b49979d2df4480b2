//! Shared LLM service with profiles: **fast**, **slow**, **embedding** and an
//! optional **vision** profile.
//!
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - If `slow` profile is not provided, it falls back to `fast`.
//! - Every call goes through the bounded retry policy before surfacing.

use std::{collections::HashMap, sync::Arc, time::Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    retry::{with_retries, RetryPolicy},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService, ChatCall},
};

/// Which chat profile a call should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProfile {
    /// Lower latency, used for evaluation/reranking steps.
    Fast,
    /// Higher quality, used for summaries and final answers.
    Slow,
}

/// Shared service that manages the LLM profiles.
#[derive(Debug)]
pub struct LlmServiceProfiles {
    fast: LlmModelConfig,
    slow: LlmModelConfig,
    embedding: LlmModelConfig,
    vision: Option<LlmModelConfig>,
    retry: RetryPolicy,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,
}

impl LlmServiceProfiles {
    /// Creates a new service.
    ///
    /// - `fast`: required fast profile.
    /// - `slow_opt`: optional slow profile (quality). If `None`, falls back
    ///   to `fast`.
    /// - `embedding`: required embedding profile.
    /// - `vision_opt`: optional vision profile; absent disables image
    ///   description.
    pub fn new(
        fast: LlmModelConfig,
        slow_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
        vision_opt: Option<LlmModelConfig>,
    ) -> Result<Self, AiLlmError> {
        let slow = slow_opt.unwrap_or_else(|| fast.clone());

        info!(
            fast.provider = %fast.provider,
            fast.model = %fast.model,
            slow.provider = %slow.provider,
            slow.model = %slow.model,
            embedding.provider = %embedding.provider,
            embedding.model = %embedding.model,
            vision.enabled = vision_opt.is_some(),
            "LlmServiceProfiles initialized"
        );

        Ok(Self {
            fast,
            slow,
            embedding,
            vision: vision_opt,
            retry: RetryPolicy::default(),
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
        })
    }

    /// True when a vision profile is configured.
    pub fn vision_enabled(&self) -> bool {
        self.vision.is_some()
    }

    /// Runs a chat completion on the given profile.
    ///
    /// # Errors
    /// Returns [`AiLlmError`] once the retry budget for transient failures is
    /// exhausted.
    pub async fn chat(&self, profile: ChatProfile, call: ChatCall<'_>) -> Result<String, AiLlmError> {
        let cfg = match profile {
            ChatProfile::Fast => &self.fast,
            ChatProfile::Slow => &self.slow,
        };
        let started = Instant::now();
        let out = with_retries(self.retry, "chat", || async move {
            match cfg.provider {
                LlmProvider::Ollama => {
                    let cli = self.get_or_init_ollama(cfg).await?;
                    cli.chat(call).await
                }
                LlmProvider::OpenAi => {
                    let cli = self.get_or_init_openai(cfg).await?;
                    cli.chat(call).await
                }
            }
        })
        .await;

        if out.is_ok() {
            info!(
                provider = %cfg.provider,
                model = %cfg.model,
                prompt_len = call.user.len(),
                json_mode = call.json_mode,
                latency_ms = started.elapsed().as_millis() as u64,
                "chat completed"
            );
        }
        out
    }

    /// Computes an embedding for one input using the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let started = Instant::now();
        let cfg = &self.embedding;

        let out = with_retries(self.retry, "embed", || async move {
            match cfg.provider {
                LlmProvider::Ollama => {
                    let cli = self.get_or_init_ollama(cfg).await?;
                    cli.embeddings(input).await
                }
                LlmProvider::OpenAi => {
                    let cli = self.get_or_init_openai(cfg).await?;
                    cli.embeddings(input).await
                }
            }
        })
        .await;

        if out.is_ok() {
            info!(
                provider = %cfg.provider,
                model = %cfg.model,
                input_len = input.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "embeddings completed"
            );
        }
        out
    }

    /// Describes an image with the **vision** profile.
    ///
    /// # Errors
    /// Returns a config error when no vision profile is set.
    pub async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String, AiLlmError> {
        let cfg = self.vision.as_ref().ok_or(AiLlmError::Config(
            crate::error_handler::ConfigError::MissingVar("VISION_MODEL"),
        ))?;
        let started = Instant::now();

        let out = with_retries(self.retry, "vision", || async move {
            match cfg.provider {
                LlmProvider::Ollama => {
                    let cli = self.get_or_init_ollama(cfg).await?;
                    cli.describe_image(prompt, image).await
                }
                LlmProvider::OpenAi => {
                    let cli = self.get_or_init_openai(cfg).await?;
                    cli.describe_image(prompt, image).await
                }
            }
        })
        .await;

        if out.is_ok() {
            info!(
                provider = %cfg.provider,
                model = %cfg.model,
                image_bytes = image.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "image description completed"
            );
        }
        out
    }

    /// Returns references to the current profiles `(fast, slow, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig, &LlmModelConfig) {
        (&self.fast, &self.slow, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, AiLlmError> {
        let key = ClientKey::of(cfg);

        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            debug!(model = %cfg.model, "ollama client cache hit");
            return Ok(cli);
        }

        debug!(model = %cfg.model, "ollama client cache miss (initializing)");
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        let mut w = self.ollama.write().await;
        Ok(w.entry(key).or_insert(cli).clone())
    }

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiService>, AiLlmError> {
        let key = ClientKey::of(cfg);

        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            debug!(model = %cfg.model, "openai client cache hit");
            return Ok(cli);
        }

        debug!(model = %cfg.model, "openai client cache miss (initializing)");
        let cli = Arc::new(OpenAiService::new(cfg.clone())?);
        let mut w = self.openai.write().await;
        Ok(w.entry(key).or_insert(cli).clone())
    }
}

/// Cache key for the per-config client maps. The api key is part of the
/// identity so profiles pointing at the same endpoint with different
/// credentials never share a client; log the config fields instead of this
/// struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl ClientKey {
    fn of(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout_secs: cfg.timeout_secs,
        }
    }
}
