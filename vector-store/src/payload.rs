//! Payload mapping between the chunk model and Qdrant points.
//!
//! The stored payload is the full chunk serialized flat (everything except
//! the embedding); `chunk_id` doubles as the point id so re-ingestion can
//! replace records wholesale.

use qdrant_client::qdrant::PointStruct;
use qdrant_client::Payload;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use doc_base::{CollectionKind, RetrievedChunk, VectorRecord};

use crate::errors::VectorStoreError;

/// Builds Qdrant points for a batch of records, enforcing the shared
/// embedding dimension.
pub fn build_points(
    records: &[VectorRecord],
    dim: usize,
) -> Result<Vec<PointStruct>, VectorStoreError> {
    let mut points = Vec::with_capacity(records.len());
    for record in records {
        if record.embedding.len() != dim {
            return Err(VectorStoreError::VectorSizeMismatch {
                got: record.embedding.len(),
                want: dim,
            });
        }

        let as_json: Value = serde_json::to_value(&record.chunk)
            .map_err(|e| VectorStoreError::Payload(format!("chunk json: {e}")))?;
        let payload: Payload = as_json
            .try_into()
            .map_err(|e| VectorStoreError::Payload(format!("payload convert: {e}")))?;

        points.push(PointStruct::new(
            record.chunk.chunk_id.to_string(),
            record.embedding.clone(),
            payload,
        ));
    }
    Ok(points)
}

/// Extracts the retrieval-facing fields from a stored payload.
///
/// Records with an unparseable id are skipped with a warning rather than
/// failing the whole search.
pub fn to_retrieved(
    payload: &Value,
    score: f64,
    source: CollectionKind,
) -> Option<RetrievedChunk> {
    let chunk_id = payload
        .get("chunk_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let doc_id = payload
        .get("doc_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let (Some(chunk_id), Some(doc_id)) = (chunk_id, doc_id) else {
        warn!("payload::to_retrieved: record without parseable ids, skipping");
        return None;
    };

    let content = payload
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let hierarchy_path = payload
        .get("hierarchy_path")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|x| x.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let page_number = payload
        .get("page_number")
        .and_then(|v| v.as_u64())
        .map(|p| p as u32);

    Some(RetrievedChunk {
        chunk_id,
        doc_id,
        score,
        content,
        hierarchy_path,
        page_number,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_base::{Chunk, ChunkMetadata, SummaryLevel};
    use std::collections::BTreeMap;

    fn sample_chunk() -> Chunk {
        Chunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            content: "Overview of the plan".into(),
            hierarchy_path: vec!["Plan".into()],
            page_number: Some(2),
            language: "en".into(),
            is_multilingual: false,
            languages: vec!["en".into()],
            language_distribution: BTreeMap::from([("en".to_string(), 1.0)]),
            metadata: ChunkMetadata::Summary {
                level: SummaryLevel::Section,
            },
        }
    }

    #[test]
    fn payload_round_trips_to_retrieved() {
        let chunk = sample_chunk();
        let payload = serde_json::to_value(&chunk).unwrap();

        let hit = to_retrieved(&payload, 0.87, CollectionKind::Summaries).unwrap();
        assert_eq!(hit.chunk_id, chunk.chunk_id);
        assert_eq!(hit.doc_id, chunk.doc_id);
        assert_eq!(hit.content, chunk.content);
        assert_eq!(hit.hierarchy_path, chunk.hierarchy_path);
        assert_eq!(hit.page_number, Some(2));
        assert_eq!(hit.source, CollectionKind::Summaries);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let record = VectorRecord {
            embedding: vec![0.0; 8],
            chunk: sample_chunk(),
        };
        let err = build_points(std::slice::from_ref(&record), 16).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::VectorSizeMismatch { got: 8, want: 16 }
        ));
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let payload = serde_json::json!({"chunk_id": "not-a-uuid", "doc_id": 3});
        assert!(to_retrieved(&payload, 0.0, CollectionKind::Chunks).is_none());
    }
}
