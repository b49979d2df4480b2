//! `doc-base` capability port implementations backed by the profile service.
//!
//! Each wrapper pins one concern of [`LlmServiceProfiles`] behind the
//! matching port trait so the workers depend on traits only.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::debug;

use doc_base::{Chat, ChatRequest, Embedder, PortError, VisionDescriber};

use crate::service_profiles::{ChatProfile, LlmServiceProfiles};
use crate::services::ChatCall;

/// Chat port bound to one profile of the shared service.
pub struct ProfileChat {
    svc: Arc<LlmServiceProfiles>,
    profile: ChatProfile,
}

impl ProfileChat {
    pub fn new(svc: Arc<LlmServiceProfiles>, profile: ChatProfile) -> Self {
        Self { svc, profile }
    }
}

#[async_trait]
impl Chat for ProfileChat {
    async fn complete(&self, req: ChatRequest<'_>) -> Result<String, PortError> {
        let call = ChatCall {
            system: req.system,
            user: req.user,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            json_mode: req.json_mode,
        };
        Ok(self.svc.chat(self.profile, call).await?)
    }
}

/// Embedding port with bounded-concurrency batching and a dimension check.
pub struct ProfileEmbedder {
    svc: Arc<LlmServiceProfiles>,
    /// Expected embedding dimension.
    dim: usize,
    /// Maximum concurrent embedding calls per batch.
    concurrency: usize,
}

impl ProfileEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: usize, concurrency: usize) -> Self {
        Self {
            svc,
            dim,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl Embedder for ProfileEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PortError> {
        debug!(total = texts.len(), concurrency = self.concurrency, "embedding batch");

        // Completion order is arbitrary; reassemble by index.
        let indexed: Vec<(usize, Vec<f32>)> = stream::iter(texts.iter().cloned().enumerate())
            .map(|(i, text)| async move {
                let v = self.svc.embed(&text).await?;
                Ok::<(usize, Vec<f32>), PortError>((i, v))
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, PortError>>()?;

        let mut out = vec![Vec::new(); texts.len()];
        for (i, v) in indexed {
            if v.len() != self.dim {
                return Err(PortError::Storage(format!(
                    "embedding dimension mismatch: got {}, want {}",
                    v.len(),
                    self.dim
                )));
            }
            out[i] = v;
        }
        Ok(out)
    }
}

/// Vision port over the optional vision profile.
pub struct ProfileVision {
    svc: Arc<LlmServiceProfiles>,
    prompt: String,
}

impl ProfileVision {
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Self {
        Self {
            svc,
            prompt: "Describe all visual elements in this image, especially charts and diagrams. \
                     Be concise and factual."
                .into(),
        }
    }
}

#[async_trait]
impl VisionDescriber for ProfileVision {
    async fn describe(&self, image: &[u8]) -> Result<String, PortError> {
        Ok(self.svc.describe_image(&self.prompt, image).await?)
    }
}
