//! Hybrid retrieval: dense + lexical search across the three collections,
//! fused with Reciprocal Rank Fusion.
//!
//! The six per-collection fetches run concurrently and may complete in any
//! order; fusion is deterministic given the full result set. Ties break by
//! collection priority (chunks > qa > summaries), then document id, then
//! chunk id.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use doc_base::{CollectionKind, PortError, RetrievedChunk, SearchSources, VectorIndex};

/// One fused retrieval candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: RetrievedChunk,
    /// Summed RRF score across the ranked lists the chunk appeared in.
    pub fused_score: f64,
}

/// Full outcome of one retrieval round.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub candidates: Vec<Candidate>,
    pub sources: SearchSources,
}

/// Dense + lexical retriever over the vector index port.
pub struct HybridRetriever {
    index: Arc<dyn VectorIndex>,
}

impl HybridRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Runs the six searches and fuses them into at most `top_k` candidates.
    ///
    /// An empty `document_filter` slice means "no filter".
    pub async fn search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
        rrf_k: u32,
        document_filter: Option<&[Uuid]>,
    ) -> Result<RetrievalOutcome, PortError> {
        let filter = document_filter.filter(|ids| !ids.is_empty());

        let index = &self.index;
        let dense =
            |c: CollectionKind| async move { index.dense_search(c, query_embedding, top_k, filter).await };
        let lexical =
            |c: CollectionKind| async move { index.lexical_search(c, query_text, top_k, filter).await };

        let (dense_chunks, dense_summaries, dense_qa, lex_chunks, lex_summaries, lex_qa) = tokio::try_join!(
            dense(CollectionKind::Chunks),
            dense(CollectionKind::Summaries),
            dense(CollectionKind::Qa),
            lexical(CollectionKind::Chunks),
            lexical(CollectionKind::Summaries),
            lexical(CollectionKind::Qa),
        )?;

        let mut sources = SearchSources {
            vector_chunks: dense_chunks.len(),
            vector_summaries: dense_summaries.len(),
            vector_qa: dense_qa.len(),
            keyword_bm25: lex_chunks.len() + lex_summaries.len() + lex_qa.len(),
            after_merge: 0,
        };
        debug!(
            vector_chunks = sources.vector_chunks,
            vector_summaries = sources.vector_summaries,
            vector_qa = sources.vector_qa,
            keyword_bm25 = sources.keyword_bm25,
            "hybrid search fetched"
        );

        // One lexical ranked list across collections, ordered by BM25 score,
        // plus the three dense lists.
        let mut lexical_merged: Vec<RetrievedChunk> = lex_chunks
            .into_iter()
            .chain(lex_summaries)
            .chain(lex_qa)
            .collect();
        lexical_merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        let ranked_lists = [dense_chunks, dense_summaries, dense_qa, lexical_merged];
        let mut fused = rrf_fuse(&ranked_lists, rrf_k);
        sources.after_merge = fused.len();
        fused.truncate(top_k);

        info!(
            after_merge = sources.after_merge,
            returned = fused.len(),
            "hybrid search fused"
        );
        Ok(RetrievalOutcome {
            candidates: fused,
            sources,
        })
    }
}

/// Reciprocal Rank Fusion: each appearance contributes `1 / (k + rank)`;
/// scores sum per chunk id. The result is the full deduped list sorted by
/// fused score descending with deterministic tie-breaks.
pub fn rrf_fuse(ranked_lists: &[Vec<RetrievedChunk>], rrf_k: u32) -> Vec<Candidate> {
    let k = rrf_k as f64;
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut chunks: HashMap<Uuid, RetrievedChunk> = HashMap::new();

    for list in ranked_lists {
        for (rank0, chunk) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (rank0 + 1) as f64);
            *scores.entry(chunk.chunk_id).or_insert(0.0) += contribution;
            chunks.entry(chunk.chunk_id).or_insert_with(|| chunk.clone());
        }
    }

    let mut fused: Vec<Candidate> = scores
        .into_iter()
        .map(|(chunk_id, fused_score)| Candidate {
            chunk: chunks.remove(&chunk_id).expect("chunk recorded with score"),
            fused_score,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.chunk
                    .source
                    .priority()
                    .cmp(&b.chunk.source.priority())
            })
            .then_with(|| {
                a.chunk
                    .doc_id
                    .to_string()
                    .cmp(&b.chunk.doc_id.to_string())
            })
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    fused
}
