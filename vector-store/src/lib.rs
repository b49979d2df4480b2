//! Qdrant-backed vector index: ingestion upserts + dense and lexical
//! retrieval over the three chunk collections.
//!
//! This crate provides a clean API to:
//! - Upsert embedded chunks into the collection matching their variant
//! - Delete every record of a document before re-ingestion
//! - Run dense cosine search and a BM25-ranked lexical search per collection
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules.

mod config;
mod errors;
mod filters;
mod lexical;
mod payload;
mod qdrant_facade;

pub use config::VectorStoreConfig;
pub use errors::VectorStoreError;

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use doc_base::{CollectionKind, PortError, RetrievedChunk, VectorIndex, VectorRecord};

/// High-level facade that wires configuration and the Qdrant client.
///
/// This is the single entry point recommended for application code.
pub struct VectorStore {
    cfg: VectorStoreConfig,
    client: qdrant_facade::QdrantFacade,
}

impl VectorStore {
    /// Constructs a new store from the given configuration.
    ///
    /// # Errors
    /// Returns `VectorStoreError::Config` if the client initialization fails.
    pub fn new(cfg: VectorStoreConfig) -> Result<Self, VectorStoreError> {
        trace!("VectorStore::new url={}", cfg.qdrant_url);
        let client = qdrant_facade::QdrantFacade::new(&cfg)?;
        Ok(Self { cfg, client })
    }

    /// Ensures all three collections exist with the configured vector space
    /// and a full-text index on `content`.
    pub async fn ensure_collections(&self) -> Result<(), VectorStoreError> {
        for kind in CollectionKind::ALL {
            self.client
                .ensure_collection(kind.name(), self.cfg.embedding_dim)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    async fn upsert(
        &self,
        collection: CollectionKind,
        records: Vec<VectorRecord>,
    ) -> Result<usize, PortError> {
        debug!(
            collection = collection.name(),
            count = records.len(),
            "VectorStore::upsert"
        );
        if records.is_empty() {
            return Ok(0);
        }

        let mut total = 0usize;
        let batch_size = self.cfg.upsert_batch.max(1);
        for batch in records.chunks(batch_size) {
            let points = payload::build_points(batch, self.cfg.embedding_dim)?;
            total += self.client.upsert_points(collection.name(), points).await?;
        }
        Ok(total)
    }

    async fn delete_by_doc(
        &self,
        collection: CollectionKind,
        doc_id: Uuid,
    ) -> Result<(), PortError> {
        debug!(
            collection = collection.name(),
            %doc_id,
            "VectorStore::delete_by_doc"
        );
        let filter = filters::doc_id_filter(doc_id);
        self.client
            .delete_by_filter(collection.name(), filter)
            .await?;
        Ok(())
    }

    async fn dense_search(
        &self,
        collection: CollectionKind,
        vector: &[f32],
        top_k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError> {
        trace!(
            collection = collection.name(),
            top_k,
            filtered = filter.is_some(),
            "VectorStore::dense_search"
        );
        let qfilter = filter.and_then(filters::doc_filter);
        let hits = self
            .client
            .search(collection.name(), vector.to_vec(), top_k as u64, qfilter)
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|(score, value)| payload::to_retrieved(&value, score as f64, collection))
            .collect())
    }

    async fn lexical_search(
        &self,
        collection: CollectionKind,
        text: &str,
        top_k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError> {
        trace!(
            collection = collection.name(),
            top_k,
            "VectorStore::lexical_search"
        );

        let Some(text_filter) = filters::content_terms_filter(text, filter) else {
            return Ok(Vec::new());
        };

        // Full-text-filtered recall, then BM25 ranking in process.
        let candidates = self
            .client
            .scroll(collection.name(), text_filter, self.cfg.lexical_scan_limit)
            .await?;

        let chunks: Vec<RetrievedChunk> = candidates
            .iter()
            .filter_map(|value| payload::to_retrieved(value, 0.0, collection))
            .collect();

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let ranked = lexical::bm25_rank(text, &contents, top_k);

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| {
                let mut hit = chunks[idx].clone();
                hit.score = score;
                hit
            })
            .collect())
    }
}
