//! Query result and debug-data models.
//!
//! The debug shapes are UI-facing and must round-trip through JSON without
//! field renames; every field name here is part of that contract.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Evaluator decision after inspecting retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentDecision {
    Proceed,
    RefineQuery,
    ExpandSearch,
}

impl AgentDecision {
    /// Parses a loosely formatted decision; unknown values coerce to
    /// `Proceed`.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "refine_query" => AgentDecision::RefineQuery,
            "expand_search" => AgentDecision::ExpandSearch,
            _ => AgentDecision::Proceed,
        }
    }
}

/// Full evaluator output for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvaluation {
    pub decision: AgentDecision,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_query: Option<String>,
}

/// Per-source hit counts for one retrieval round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSources {
    pub vector_chunks: usize,
    pub vector_summaries: usize,
    pub vector_qa: usize,
    pub keyword_bm25: usize,
    pub after_merge: usize,
}

/// One chunk as shown in the debug UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub id: Uuid,
    pub score: f64,
    /// Payload type tag of the record (`text_chunk`, `summary`, `qa`).
    pub source: String,
    pub section: String,
    pub preview: String,
    /// `rerank_score - prior_score`, set on the after-rerank list only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_change: Option<f64>,
}

/// Debug record for one agent iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationDebug {
    /// 1-based iteration ordinal.
    pub iteration_number: usize,
    pub query_used: String,
    pub search_sources: SearchSources,
    pub chunks_before_rerank: Vec<ChunkResult>,
    pub chunks_after_rerank: Vec<ChunkResult>,
    pub agent_evaluation: AgentEvaluation,
    pub duration_ms: u64,
}

/// Stage totals accumulated across iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugTiming {
    pub embedding_ms: u64,
    pub search_ms: u64,
    pub rerank_ms: u64,
    pub agent_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}

/// Complete debug capture for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugData {
    pub iterations: Vec<IterationDebug>,
    pub timing: DebugTiming,
}

/// A numbered citation in the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Inline citation ordinal as it appears in the answer text (`[n]`).
    pub n: usize,
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub hierarchy_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// Persisted result of one query job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: Uuid,
    pub query_text: String,
    pub answer: Option<String>,
    pub confidence_score: Option<f64>,
    pub citations: Vec<Citation>,
    pub total_time_ms: u64,
    pub iteration_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_data: Option<DebugData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_debug() -> DebugData {
        DebugData {
            iterations: vec![IterationDebug {
                iteration_number: 1,
                query_used: "what is the strategy?".into(),
                search_sources: SearchSources {
                    vector_chunks: 10,
                    vector_summaries: 5,
                    vector_qa: 5,
                    keyword_bm25: 7,
                    after_merge: 18,
                },
                chunks_before_rerank: vec![ChunkResult {
                    id: Uuid::new_v4(),
                    score: 0.031,
                    source: "text_chunk".into(),
                    section: "Strategy".into(),
                    preview: "The strategy is".into(),
                    score_change: None,
                }],
                chunks_after_rerank: vec![ChunkResult {
                    id: Uuid::new_v4(),
                    score: 0.92,
                    source: "text_chunk".into(),
                    section: "Strategy".into(),
                    preview: "The strategy is".into(),
                    score_change: Some(0.889),
                }],
                agent_evaluation: AgentEvaluation {
                    decision: AgentDecision::Proceed,
                    confidence: 0.9,
                    reasoning: "sufficient".into(),
                    refined_query: None,
                },
                duration_ms: 120,
            }],
            timing: DebugTiming {
                embedding_ms: 10,
                search_ms: 40,
                rerank_ms: 30,
                agent_ms: 35,
                generation_ms: 80,
                total_ms: 200,
            },
        }
    }

    #[test]
    fn debug_data_json_round_trip_is_identity() {
        let debug = sample_debug();
        let json = serde_json::to_string(&debug).unwrap();
        let back: DebugData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, debug);
    }

    #[test]
    fn debug_data_field_names_are_stable() {
        let v = serde_json::to_value(sample_debug()).unwrap();
        let it = &v["iterations"][0];
        for key in [
            "iteration_number",
            "query_used",
            "search_sources",
            "chunks_before_rerank",
            "chunks_after_rerank",
            "agent_evaluation",
            "duration_ms",
        ] {
            assert!(it.get(key).is_some(), "missing {key}");
        }
        assert_eq!(it["search_sources"]["keyword_bm25"], 7);
        assert_eq!(it["agent_evaluation"]["decision"], "proceed");
        // score_change is absent before rerank, present after.
        assert!(it["chunks_before_rerank"][0].get("score_change").is_none());
        assert!(it["chunks_after_rerank"][0].get("score_change").is_some());
        assert_eq!(v["timing"]["generation_ms"], 80);
    }
}
