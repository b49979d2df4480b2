//! Retrieval hit model shared by the vector index port and the query worker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::CollectionKind;

/// A chunk returned by a dense or lexical search, with the payload fields the
/// query pipeline needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: Uuid,
    pub doc_id: Uuid,
    /// Raw score from the search that produced this hit (cosine similarity or
    /// BM25). Fusion replaces it with an RRF score downstream.
    pub score: f64,
    pub content: String,
    pub hierarchy_path: Vec<String>,
    pub page_number: Option<u32>,
    /// Collection the hit came from.
    pub source: CollectionKind,
}

impl RetrievedChunk {
    /// Human-readable location label: the deepest hierarchy entry, or the
    /// collection tag for summary/qa records without one.
    pub fn section_label(&self) -> String {
        self.hierarchy_path
            .last()
            .cloned()
            .unwrap_or_else(|| self.source.type_tag().to_string())
    }
}
