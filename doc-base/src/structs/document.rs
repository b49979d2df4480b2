//! Document row model mirrored by the MetaStore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document lifecycle status.
///
/// Transitions follow the lattice `pending -> processing -> completed|failed`;
/// the ingestion orchestrator is the single writer of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Database/string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Parses the database representation; unknown values map to `Pending`.
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "processing" => DocumentStatus::Processing,
            "completed" => DocumentStatus::Completed,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Pending,
        }
    }
}

/// The fields of the `documents` row the core reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub filename: String,
    pub file_size_bytes: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_time_seconds: Option<f64>,
    pub chunk_count: u32,
    pub vector_count: u32,
    pub qa_pairs_count: u32,
    pub detected_languages: Vec<String>,
    pub primary_language: Option<String>,
    pub summary: Option<String>,
    pub error_message: Option<String>,
}

/// Counters and derived fields written in one shot when ingestion succeeds.
///
/// Either all of these land in the Document row or none of them do; partial
/// success is never recorded.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub chunk_count: u32,
    pub vector_count: u32,
    pub qa_pairs_count: u32,
    pub detected_languages: Vec<String>,
    pub primary_language: Option<String>,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
}
