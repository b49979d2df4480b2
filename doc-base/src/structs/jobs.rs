//! Job envelopes delivered over the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable queue for ingestion jobs.
pub const INGESTION_QUEUE: &str = "document_ingestion";
/// Durable queue for query jobs.
pub const QUERY_QUEUE: &str = "query_processing";

/// One document ingestion request. Delivered at least once; the handler is
/// idempotent on `document_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub document_id: Uuid,
    pub blob_key: String,
    pub correlation_id: String,
    pub enqueued_at: DateTime<Utc>,
}

/// One query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryJob {
    pub query_id: Uuid,
    pub query_text: String,
    pub debug_mode: bool,
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,
    pub correlation_id: String,
}
