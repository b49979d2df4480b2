//! Debug-data assembly for the operator UI.

use doc_base::ChunkResult;

use crate::pipeline::hybrid::Candidate;
use crate::pipeline::reranker::RerankedChunk;

/// Leading characters of chunk content shown in the UI.
const PREVIEW_CHARS: usize = 200;

/// Pre-rerank view of the fused candidates (fused scores, no deltas).
pub fn before_rerank(candidates: &[Candidate], limit: usize) -> Vec<ChunkResult> {
    candidates
        .iter()
        .take(limit)
        .map(|c| ChunkResult {
            id: c.chunk.chunk_id,
            score: c.fused_score,
            source: c.chunk.source.type_tag().to_string(),
            section: c.chunk.section_label(),
            preview: preview(&c.chunk.content),
            score_change: None,
        })
        .collect()
}

/// Post-rerank view with score deltas.
pub fn after_rerank(ranked: &[RerankedChunk]) -> Vec<ChunkResult> {
    ranked
        .iter()
        .map(|r| ChunkResult {
            id: r.chunk.chunk_id,
            score: r.score,
            source: r.chunk.source.type_tag().to_string(),
            section: r.chunk.section_label(),
            preview: preview(&r.chunk.content),
            score_change: Some(r.score_change),
        })
        .collect()
}

fn preview(content: &str) -> String {
    if content.len() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut end = PREVIEW_CHARS;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    content[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_base::{CollectionKind, RetrievedChunk};
    use uuid::Uuid;

    #[test]
    fn previews_are_bounded_and_deltas_set_only_after_rerank() {
        let chunk = RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            doc_id: Uuid::new_v4(),
            score: 0.1,
            content: "x".repeat(500),
            hierarchy_path: vec!["Intro".into()],
            page_number: Some(1),
            source: CollectionKind::Chunks,
        };
        let before = before_rerank(
            &[Candidate {
                chunk: chunk.clone(),
                fused_score: 0.03,
            }],
            5,
        );
        assert_eq!(before[0].preview.len(), 200);
        assert!(before[0].score_change.is_none());
        assert_eq!(before[0].source, "text_chunk");
        assert_eq!(before[0].section, "Intro");

        let after = after_rerank(&[RerankedChunk {
            chunk,
            prior_score: 0.03,
            score: 0.9,
            score_change: 0.87,
        }]);
        assert_eq!(after[0].score_change, Some(0.87));
    }
}
