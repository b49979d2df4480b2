//! Runtime configuration for the vector store.

use crate::errors::VectorStoreError;

/// Configuration for ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct VectorStoreConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Embedding dimensionality shared by all collections.
    pub embedding_dim: usize,
    /// Upsert batch size (typical range: 64..512).
    pub upsert_batch: usize,
    /// Candidate cap for the lexical recall scroll.
    pub lexical_scan_limit: u32,
}

impl VectorStoreConfig {
    /// Creates a sane default config for a given Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, embedding_dim: usize) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            embedding_dim,
            upsert_batch: 100,
            lexical_scan_limit: 1000,
        }
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(VectorStoreError::Config("qdrant_url is empty".into()));
        }
        if self.embedding_dim == 0 {
            return Err(VectorStoreError::Config("embedding_dim must be > 0".into()));
        }
        if self.upsert_batch == 0 {
            return Err(VectorStoreError::Config("upsert_batch must be > 0".into()));
        }
        Ok(())
    }
}
