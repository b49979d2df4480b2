//! Runtime settings consumed by the workers.
//!
//! Values are read from the MetaStore settings table with built-in defaults;
//! a missing or malformed value falls back to the default silently so a bad
//! settings row can never take a worker down.

use serde_json::Value;

use crate::errors::PortError;
use crate::ports::MetaStore;

/// Tunables the core consumes, with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_top_k: usize,
    pub default_rerank_top: usize,
    pub max_agent_iterations: usize,
    pub rrf_k: u32,
    pub summarizer_short_doc_threshold: usize,
    pub summarizer_max_section_size: usize,
    pub summarizer_min_section_size: usize,
    pub summarizer_max_concurrent: usize,
    pub qa_pairs_per_document: usize,
    pub hierarchical_threshold_chars: usize,
    pub min_headers_for_semantic: usize,
    pub parent_chunk_multiplier: usize,
    pub parent_summary_max_length: usize,
    /// Optional prompt template overrides.
    pub prompt_summary: Option<String>,
    pub prompt_qa: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            default_top_k: 10,
            default_rerank_top: 5,
            max_agent_iterations: 3,
            rrf_k: 60,
            summarizer_short_doc_threshold: 12_000,
            summarizer_max_section_size: 15_000,
            summarizer_min_section_size: 500,
            summarizer_max_concurrent: 5,
            qa_pairs_per_document: 5,
            hierarchical_threshold_chars: 60_000,
            min_headers_for_semantic: 3,
            parent_chunk_multiplier: 2,
            parent_summary_max_length: 300,
            prompt_summary: None,
            prompt_qa: None,
        }
    }
}

impl RuntimeSettings {
    /// Loads settings from the MetaStore, keeping defaults for missing keys.
    pub async fn load(meta: &dyn MetaStore) -> Result<Self, PortError> {
        let mut s = Self::default();
        s.chunk_size = read_usize(meta, "chunk_size", s.chunk_size).await?;
        s.chunk_overlap = read_usize(meta, "chunk_overlap", s.chunk_overlap).await?;
        s.default_top_k = read_usize(meta, "default_top_k", s.default_top_k).await?;
        s.default_rerank_top = read_usize(meta, "default_rerank_top", s.default_rerank_top).await?;
        s.max_agent_iterations =
            read_usize(meta, "max_agent_iterations", s.max_agent_iterations).await?;
        s.rrf_k = read_usize(meta, "rrf_k", s.rrf_k as usize).await? as u32;
        s.summarizer_short_doc_threshold = read_usize(
            meta,
            "summarizer_short_doc_threshold",
            s.summarizer_short_doc_threshold,
        )
        .await?;
        s.summarizer_max_section_size = read_usize(
            meta,
            "summarizer_max_section_size",
            s.summarizer_max_section_size,
        )
        .await?;
        s.summarizer_min_section_size = read_usize(
            meta,
            "summarizer_min_section_size",
            s.summarizer_min_section_size,
        )
        .await?;
        s.summarizer_max_concurrent =
            read_usize(meta, "summarizer_max_concurrent", s.summarizer_max_concurrent).await?;
        s.qa_pairs_per_document =
            read_usize(meta, "qa_pairs_per_document", s.qa_pairs_per_document).await?;
        s.prompt_summary = read_string(meta, "prompt_summary").await?;
        s.prompt_qa = read_string(meta, "prompt_qa").await?;
        Ok(s)
    }
}

async fn read_usize(meta: &dyn MetaStore, key: &str, default: usize) -> Result<usize, PortError> {
    Ok(meta
        .setting(key)
        .await?
        .and_then(|v| value_as_usize(&v))
        .unwrap_or(default))
}

async fn read_string(meta: &dyn MetaStore, key: &str) -> Result<Option<String>, PortError> {
    Ok(meta.setting(key).await?.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }))
}

fn value_as_usize(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|x| x as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}
