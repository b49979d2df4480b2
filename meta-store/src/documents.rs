//! Document row persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use doc_base::{DocumentRecord, DocumentStatus, IngestOutcome};

use crate::errors::MetaStoreError;

/// Longest error message persisted on a failed document.
const ERROR_MESSAGE_MAX: usize = 2000;

pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<(), MetaStoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id UUID PRIMARY KEY,
            filename VARCHAR(255) NOT NULL,
            file_size_bytes BIGINT NOT NULL DEFAULT 0,
            mime_type VARCHAR(100) NOT NULL DEFAULT '',
            status VARCHAR(50) NOT NULL DEFAULT 'pending',
            uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            processing_started_at TIMESTAMPTZ,
            processing_completed_at TIMESTAMPTZ,
            processing_time_seconds DOUBLE PRECISION,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            vector_count INTEGER NOT NULL DEFAULT 0,
            qa_pairs_count INTEGER NOT NULL DEFAULT 0,
            detected_languages TEXT[] NOT NULL DEFAULT '{}',
            primary_language TEXT,
            summary TEXT,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch(pool: &PgPool, id: Uuid) -> Result<Option<DocumentRecord>, MetaStoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, filename, file_size_bytes, mime_type, status, uploaded_at,
               processing_started_at, processing_completed_at, processing_time_seconds,
               chunk_count, vector_count, qa_pairs_count, detected_languages,
               primary_language, summary, error_message
        FROM documents WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| DocumentRecord {
        id: r.get("id"),
        filename: r.get("filename"),
        file_size_bytes: r.get("file_size_bytes"),
        mime_type: r.get("mime_type"),
        status: DocumentStatus::from_str_loose(r.get::<String, _>("status").as_str()),
        uploaded_at: r.get("uploaded_at"),
        processing_started_at: r.get("processing_started_at"),
        processing_completed_at: r.get("processing_completed_at"),
        processing_time_seconds: r.get("processing_time_seconds"),
        chunk_count: r.get::<i32, _>("chunk_count") as u32,
        vector_count: r.get::<i32, _>("vector_count") as u32,
        qa_pairs_count: r.get::<i32, _>("qa_pairs_count") as u32,
        detected_languages: r.get("detected_languages"),
        primary_language: r.get("primary_language"),
        summary: r.get("summary"),
        error_message: r.get("error_message"),
    }))
}

/// `pending|completed|failed -> processing`. Re-processing a finished
/// document is permitted (re-ingestion), so only `processing` itself is an
/// invalid prior state.
pub(crate) async fn mark_processing(
    pool: &PgPool,
    id: Uuid,
    started_at: DateTime<Utc>,
) -> Result<(), MetaStoreError> {
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET status = 'processing',
            processing_started_at = $2,
            processing_completed_at = NULL,
            error_message = NULL
        WHERE id = $1 AND status <> 'processing'
        "#,
    )
    .bind(id)
    .bind(started_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MetaStoreError::NoRowUpdated(id));
    }
    debug!(%id, "document marked processing");
    Ok(())
}

/// `processing -> completed`, writing all counters in one statement.
pub(crate) async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    outcome: &IngestOutcome,
) -> Result<(), MetaStoreError> {
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET status = 'completed',
            processing_completed_at = $2,
            processing_time_seconds = $3,
            chunk_count = $4,
            vector_count = $5,
            qa_pairs_count = $6,
            detected_languages = $7,
            primary_language = $8,
            summary = $9,
            error_message = NULL
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(id)
    .bind(outcome.completed_at)
    .bind(outcome.processing_time_seconds)
    .bind(outcome.chunk_count as i32)
    .bind(outcome.vector_count as i32)
    .bind(outcome.qa_pairs_count as i32)
    .bind(&outcome.detected_languages)
    .bind(&outcome.primary_language)
    .bind(&outcome.summary)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MetaStoreError::NoRowUpdated(id));
    }
    debug!(%id, chunk_count = outcome.chunk_count, "document marked completed");
    Ok(())
}

/// `processing -> failed` with a truncated error message.
pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    error_message: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), MetaStoreError> {
    let message = truncate(error_message, ERROR_MESSAGE_MAX);
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET status = 'failed',
            processing_completed_at = $2,
            error_message = $3
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(id)
    .bind(completed_at)
    .bind(message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MetaStoreError::NoRowUpdated(id));
    }
    debug!(%id, "document marked failed");
    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "αβγδ";
        let t = truncate(s, 3);
        assert_eq!(t, "α");
        assert_eq!(truncate("short", 100), "short");
    }
}
