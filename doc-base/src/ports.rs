//! Capability ports: the only way the workers reach external services.
//!
//! Each port is an object-safe async trait; adapters live in sibling crates
//! and tests substitute deterministic fakes. Retry policy for transient and
//! rate-limit failures lives inside the adapters, not behind these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::PortError;
use crate::structs::chunk::{CollectionKind, LanguageProfile, VectorRecord};
use crate::structs::document::{DocumentRecord, IngestOutcome};
use crate::structs::extract::ExtractedDocument;
use crate::structs::query::QueryRecord;
use crate::structs::search::RetrievedChunk;

/// Binary object storage the uploaded documents live in.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, PortError>;
}

/// Structure extraction for binary documents (layout OCR and friends).
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], mime_type: &str)
        -> Result<ExtractedDocument, PortError>;
}

/// Caption generation for image regions.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, image: &[u8]) -> Result<String, PortError>;
}

/// One chat completion request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a JSON object response where supported.
    pub json_mode: bool,
}

/// Chat completion capability.
#[async_trait]
pub trait Chat: Send + Sync {
    async fn complete(&self, req: ChatRequest<'_>) -> Result<String, PortError>;
}

/// Text embedding capability. Returns one fixed-dimension vector per input,
/// in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PortError>;
}

/// Per-chunk language analysis. Local and synchronous by contract.
pub trait LanguageTagger: Send + Sync {
    fn analyze(&self, text: &str) -> LanguageProfile;
}

/// Vector store with one collection per chunk family.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upserts records, returning the acknowledged count.
    async fn upsert(
        &self,
        collection: CollectionKind,
        records: Vec<VectorRecord>,
    ) -> Result<usize, PortError>;

    /// Removes every record of `doc_id` from the collection.
    async fn delete_by_doc(&self, collection: CollectionKind, doc_id: Uuid)
        -> Result<(), PortError>;

    /// Dense cosine search; `filter` restricts to the given document ids.
    async fn dense_search(
        &self,
        collection: CollectionKind,
        vector: &[f32],
        top_k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError>;

    /// Lexical ranked search over the full-text-indexed `content` field.
    async fn lexical_search(
        &self,
        collection: CollectionKind,
        text: &str,
        top_k: usize,
        filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError>;
}

/// Relational metadata store: Document rows, query results, settings.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PortError>;

    /// `pending -> processing`, stamping `processing_started_at`.
    async fn mark_processing(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<(), PortError>;

    /// `processing -> completed`, writing counters and derived fields in one
    /// update.
    async fn mark_completed(&self, id: Uuid, outcome: &IngestOutcome) -> Result<(), PortError>;

    /// `processing -> failed`, persisting a truncated error message.
    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    async fn put_query_result(&self, record: &QueryRecord) -> Result<(), PortError>;

    async fn setting(&self, key: &str) -> Result<Option<serde_json::Value>, PortError>;

    async fn put_setting(&self, key: &str, value: serde_json::Value) -> Result<(), PortError>;
}
