//! Retrievable chunk model: the shared envelope plus per-variant metadata.
//!
//! The three chunk families differ by payload shape and by which vector
//! collection they land in; a tagged enum carries the variant-specific fields
//! while the envelope stays flat, matching the stored payload schema exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-chunk language analysis produced by the language tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub primary_language: String,
    pub is_multilingual: bool,
    pub languages: Vec<String>,
    /// Language -> ratio of classified words; ratios sum to 1.0.
    pub distribution: BTreeMap<String, f64>,
}

impl LanguageProfile {
    /// Profile for content too small to classify.
    pub fn unknown() -> Self {
        Self {
            primary_language: "unknown".into(),
            is_multilingual: false,
            languages: Vec::new(),
            distribution: BTreeMap::new(),
        }
    }
}

/// How `token_count` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCountMethod {
    Estimated,
    Exact,
}

/// Summary granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLevel {
    Document,
    Section,
}

/// Variant-specific chunk metadata; the `type` tag is part of the stored
/// payload and drives collection routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkMetadata {
    TextChunk {
        token_count: usize,
        token_count_method: TokenCountMethod,
        /// Child chunk ids, present only on hierarchical parent chunks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<Uuid>>,
    },
    Summary {
        level: SummaryLevel,
    },
    Qa {
        question: String,
        answer: String,
        question_type: super::qa::QaKind,
    },
}

/// A retrievable unit of content with its metadata envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub doc_id: Uuid,
    pub content: String,
    pub hierarchy_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub language: String,
    pub is_multilingual: bool,
    pub languages: Vec<String>,
    pub language_distribution: BTreeMap<String, f64>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// The vector collection this chunk belongs to.
    pub fn collection(&self) -> CollectionKind {
        match self.metadata {
            ChunkMetadata::TextChunk { .. } => CollectionKind::Chunks,
            ChunkMetadata::Summary { .. } => CollectionKind::Summaries,
            ChunkMetadata::Qa { .. } => CollectionKind::Qa,
        }
    }

    /// Attaches a language profile to the envelope fields.
    pub fn with_language(mut self, profile: &LanguageProfile) -> Self {
        self.language = profile.primary_language.clone();
        self.is_multilingual = profile.is_multilingual;
        self.languages = profile.languages.clone();
        self.language_distribution = profile.distribution.clone();
        self
    }
}

/// The three vector collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Chunks,
    Summaries,
    Qa,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Chunks,
        CollectionKind::Summaries,
        CollectionKind::Qa,
    ];

    /// Collection name in the vector store.
    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Chunks => "documents_chunks",
            CollectionKind::Summaries => "documents_summaries",
            CollectionKind::Qa => "documents_qa",
        }
    }

    /// Payload `type` tag stored with every record of this collection.
    pub fn type_tag(&self) -> &'static str {
        match self {
            CollectionKind::Chunks => "text_chunk",
            CollectionKind::Summaries => "summary",
            CollectionKind::Qa => "qa",
        }
    }

    /// Fusion tie-break priority: chunks > qa > summaries.
    pub fn priority(&self) -> u8 {
        match self {
            CollectionKind::Chunks => 0,
            CollectionKind::Qa => 1,
            CollectionKind::Summaries => 2,
        }
    }
}

/// An embedded chunk ready for upsert. The payload is the full chunk; the
/// embedding dimension must match the collection's vector space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub chunk: Chunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_type_tags_round_trip() {
        let meta = ChunkMetadata::TextChunk {
            token_count: 42,
            token_count_method: TokenCountMethod::Estimated,
            children: None,
        };
        let v = serde_json::to_value(&meta).unwrap();
        assert_eq!(v["type"], "text_chunk");
        assert_eq!(v["token_count_method"], "estimated");
        assert!(v.get("children").is_none());

        let back: ChunkMetadata = serde_json::from_value(v).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn collection_routing_follows_variant() {
        let chunk = Chunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            content: "Q: a\nA: b".into(),
            hierarchy_path: vec![],
            page_number: None,
            language: "en".into(),
            is_multilingual: false,
            languages: vec!["en".into()],
            language_distribution: BTreeMap::new(),
            metadata: ChunkMetadata::Qa {
                question: "a".into(),
                answer: "b".into(),
                question_type: super::super::qa::QaKind::Factual,
            },
        };
        assert_eq!(chunk.collection(), CollectionKind::Qa);
        assert_eq!(chunk.collection().name(), "documents_qa");
    }
}
