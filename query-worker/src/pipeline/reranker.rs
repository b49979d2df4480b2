//! LLM rescoring of the fused candidate list.
//!
//! The model is asked for a JSON ranking of the top candidates with a
//! relevance score per index. Any failure along the way (transport after
//! retries, unparseable output, empty ranking) degrades to passing the
//! candidates through in their original order with `score_change = 0`; the
//! caller records the fallback in the evaluator's reasoning.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use doc_base::{json_repair, Chat, ChatRequest, RetrievedChunk};

use super::hybrid::Candidate;

const RERANK_MAX_TOKENS: u32 = 300;
const RERANK_TEMPERATURE: f32 = 0.0;
/// Candidate text cap inside the rerank prompt.
const CANDIDATE_PREVIEW_CHARS: usize = 500;

const RERANK_SYSTEM: &str =
    "You are a relevance ranking assistant. Always respond with valid JSON.";

/// One reranked context chunk with its score delta.
#[derive(Debug, Clone)]
pub struct RerankedChunk {
    pub chunk: RetrievedChunk,
    /// Fused score before reranking.
    pub prior_score: f64,
    /// Rerank score.
    pub score: f64,
    /// `score - prior_score`.
    pub score_change: f64,
}

/// Outcome of one rerank round.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub ranked: Vec<RerankedChunk>,
    /// True when the passthrough fallback was used.
    pub fallback: bool,
}

/// Chat-backed reranker.
pub struct Reranker {
    chat: Arc<dyn Chat>,
}

impl Reranker {
    pub fn new(chat: Arc<dyn Chat>) -> Self {
        Self { chat }
    }

    /// Rescoring of `candidates`, returning at most `top_k` chunks.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
        top_k: usize,
    ) -> RerankOutcome {
        if candidates.is_empty() || top_k == 0 {
            return RerankOutcome {
                ranked: Vec::new(),
                fallback: false,
            };
        }

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{i}] {}", preview(&c.chunk.content)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let user = format!(
            "Given the query and the numbered document chunks below, score each chunk's \
             relevance to the query between 0.0 and 1.0 and return the {top_k} most relevant.\n\n\
             Query: {query}\n\nChunks:\n{listing}\n\n\
             Respond in JSON: {{\"ranking\": [{{\"index\": 0, \"score\": 0.93}}]}}"
        );

        let response = self
            .chat
            .complete(ChatRequest {
                system: RERANK_SYSTEM,
                user: &user,
                max_tokens: RERANK_MAX_TOKENS,
                temperature: RERANK_TEMPERATURE,
                json_mode: true,
            })
            .await;

        let ranked = match response {
            Ok(raw) => parse_ranking(&raw, candidates, top_k),
            Err(e) => {
                warn!(error = %e, "rerank chat failed");
                Vec::new()
            }
        };

        if ranked.is_empty() {
            warn!("reranking unavailable, falling back to fused order");
            let passthrough = candidates
                .iter()
                .take(top_k)
                .map(|c| RerankedChunk {
                    chunk: c.chunk.clone(),
                    prior_score: c.fused_score,
                    score: c.fused_score,
                    score_change: 0.0,
                })
                .collect();
            return RerankOutcome {
                ranked: passthrough,
                fallback: true,
            };
        }

        debug!(returned = ranked.len(), "rerank complete");
        RerankOutcome {
            ranked,
            fallback: false,
        }
    }
}

/// Parses `{"ranking": [{"index", "score"}]}`, dropping invalid or duplicate
/// indices, sorted by score descending.
fn parse_ranking(raw: &str, candidates: &[Candidate], top_k: usize) -> Vec<RerankedChunk> {
    let Some(value) = json_repair::extract_json(raw) else {
        return Vec::new();
    };
    let items = match &value {
        Value::Object(map) => map.get("ranking").and_then(|v| v.as_array()).cloned(),
        Value::Array(items) => Some(items.clone()),
        _ => None,
    };
    let Some(items) = items else {
        return Vec::new();
    };

    let mut seen = vec![false; candidates.len()];
    let mut ranked: Vec<RerankedChunk> = items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let index = obj.get("index")?.as_u64()? as usize;
            let score = obj.get("score")?.as_f64()?;
            if index >= candidates.len() || seen[index] {
                return None;
            }
            seen[index] = true;
            let candidate = &candidates[index];
            Some(RerankedChunk {
                chunk: candidate.chunk.clone(),
                prior_score: candidate.fused_score,
                score,
                score_change: score - candidate.fused_score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    ranked.truncate(top_k);
    ranked
}

fn preview(content: &str) -> &str {
    if content.len() <= CANDIDATE_PREVIEW_CHARS {
        return content;
    }
    let mut end = CANDIDATE_PREVIEW_CHARS;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_base::CollectionKind;
    use uuid::Uuid;

    fn candidate(id: u128, fused: f64) -> Candidate {
        Candidate {
            chunk: RetrievedChunk {
                chunk_id: Uuid::from_u128(id),
                doc_id: Uuid::from_u128(99),
                score: fused,
                content: format!("candidate {id}"),
                hierarchy_path: Vec::new(),
                page_number: None,
                source: CollectionKind::Chunks,
            },
            fused_score: fused,
        }
    }

    #[test]
    fn parse_ranking_computes_score_change() {
        let candidates = vec![candidate(1, 0.016), candidate(2, 0.031)];
        let raw = r#"{"ranking": [{"index": 1, "score": 0.9}, {"index": 0, "score": 0.4}]}"#;

        let ranked = parse_ranking(raw, &candidates, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.chunk_id, Uuid::from_u128(2));
        assert!((ranked[0].score_change - (0.9 - 0.031)).abs() < 1e-9);
        assert!((ranked[1].score_change - (0.4 - 0.016)).abs() < 1e-9);
    }

    #[test]
    fn invalid_and_duplicate_indices_are_dropped() {
        let candidates = vec![candidate(1, 0.1)];
        let raw = r#"{"ranking": [
            {"index": 7, "score": 0.9},
            {"index": 0, "score": 0.8},
            {"index": 0, "score": 0.7}
        ]}"#;
        let ranked = parse_ranking(raw, &candidates, 5);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn garbage_yields_empty_ranking() {
        let candidates = vec![candidate(1, 0.1)];
        assert!(parse_ranking("no json at all", &candidates, 5).is_empty());
    }
}
