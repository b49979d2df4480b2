//! Persisted query results.

use sqlx::PgPool;
use tracing::debug;

use doc_base::QueryRecord;

use crate::errors::MetaStoreError;

pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<(), MetaStoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id UUID PRIMARY KEY,
            query_text TEXT NOT NULL,
            answer TEXT,
            confidence_score DOUBLE PRECISION,
            citations JSONB NOT NULL DEFAULT '[]',
            total_time_ms BIGINT NOT NULL DEFAULT 0,
            iteration_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            debug_data JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Upserts the result row for a query id. Re-delivered jobs overwrite their
/// previous result, keeping the handler idempotent.
pub(crate) async fn put(pool: &PgPool, record: &QueryRecord) -> Result<(), MetaStoreError> {
    let citations = serde_json::to_value(&record.citations)?;
    let debug_data = record
        .debug_data
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO queries (
            id, query_text, answer, confidence_score, citations,
            total_time_ms, iteration_count, error_message, debug_data
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            answer = EXCLUDED.answer,
            confidence_score = EXCLUDED.confidence_score,
            citations = EXCLUDED.citations,
            total_time_ms = EXCLUDED.total_time_ms,
            iteration_count = EXCLUDED.iteration_count,
            error_message = EXCLUDED.error_message,
            debug_data = EXCLUDED.debug_data
        "#,
    )
    .bind(record.query_id)
    .bind(&record.query_text)
    .bind(&record.answer)
    .bind(record.confidence_score)
    .bind(citations)
    .bind(record.total_time_ms as i64)
    .bind(record.iteration_count as i32)
    .bind(&record.error_message)
    .bind(debug_data)
    .execute(pool)
    .await?;

    debug!(query_id = %record.query_id, "query result persisted");
    Ok(())
}
