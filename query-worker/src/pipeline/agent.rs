//! Agentic evaluation of retrieval quality.
//!
//! Decides whether the reranked context is sufficient (`proceed`), the query
//! should be rewritten (`refine_query`), or the search should be broadened
//! (`expand_search`). Parse failures recover to a safe `proceed`; the final
//! permitted iteration short-circuits to `proceed` without a model call.

use std::sync::Arc;

use tracing::{info, warn};

use doc_base::{json_repair, AgentDecision, AgentEvaluation, Chat, ChatRequest, PortError};

use super::reranker::RerankedChunk;

const AGENT_MAX_TOKENS: u32 = 200;
const AGENT_TEMPERATURE: f32 = 0.1;
/// Context preview length per chunk in the evaluator prompt.
const CONTEXT_PREVIEW_CHARS: usize = 300;
/// At most this many chunks are shown to the evaluator.
const CONTEXT_CHUNKS: usize = 5;

const AGENT_SYSTEM: &str = "You are an evaluation agent. Always respond with valid JSON.";

/// Chat-backed evaluator.
pub struct AgentEvaluator {
    chat: Arc<dyn Chat>,
}

impl AgentEvaluator {
    pub fn new(chat: Arc<dyn Chat>) -> Self {
        Self { chat }
    }

    /// Evaluates the context for `query` at iteration `iteration` of
    /// `max_iterations` (both 1-based).
    ///
    /// # Errors
    /// Only transport failures propagate; malformed model output recovers to
    /// the safe default locally.
    pub async fn evaluate(
        &self,
        query: &str,
        context: &[RerankedChunk],
        iteration: usize,
        max_iterations: usize,
    ) -> Result<AgentEvaluation, PortError> {
        if iteration >= max_iterations {
            return Ok(AgentEvaluation {
                decision: AgentDecision::Proceed,
                confidence: 1.0,
                reasoning: "Maximum iterations reached, proceeding with available information"
                    .into(),
                refined_query: None,
            });
        }

        let context_text = context
            .iter()
            .take(CONTEXT_CHUNKS)
            .map(|c| preview(&c.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "You are evaluating whether retrieved information is sufficient to answer a query.\n\n\
             Query: {query}\n\n\
             Retrieved Information:\n{context_text}\n\n\
             Evaluate the quality and sufficiency of the retrieved information. Choose ONE action:\n\
             1. \"proceed\" - Information is sufficient to answer the query\n\
             2. \"refine_query\" - Information is insufficient, suggest a refined query\n\
             3. \"expand_search\" - Information is partially relevant, expand search scope\n\n\
             Respond in JSON format:\n\
             {{\n  \"decision\": \"proceed|refine_query|expand_search\",\n  \"confidence\": 0.0-1.0,\n  \"reasoning\": \"brief explanation\",\n  \"refined_query\": \"new query if refine_query, else null\"\n}}"
        );

        let raw = self
            .chat
            .complete(ChatRequest {
                system: AGENT_SYSTEM,
                user: &user,
                max_tokens: AGENT_MAX_TOKENS,
                temperature: AGENT_TEMPERATURE,
                json_mode: true,
            })
            .await?;

        let evaluation = parse_evaluation(&raw);
        info!(
            decision = ?evaluation.decision,
            confidence = evaluation.confidence,
            "agent evaluation"
        );
        Ok(evaluation)
    }
}

/// Parses the evaluator's JSON, coercing out-of-range values and recovering
/// from unparseable output.
pub fn parse_evaluation(raw: &str) -> AgentEvaluation {
    let Some(value) = json_repair::extract_json(raw) else {
        warn!("agent response contained no JSON, defaulting to proceed");
        return AgentEvaluation {
            decision: AgentDecision::Proceed,
            confidence: 0.5,
            reasoning: "parse_failed".into(),
            refined_query: None,
        };
    };

    let decision = value
        .get("decision")
        .and_then(|v| v.as_str())
        .map(AgentDecision::from_loose)
        .unwrap_or(AgentDecision::Proceed);

    let raw_confidence = value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5);
    let confidence = raw_confidence.clamp(0.0, 1.0);

    let mut reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if (raw_confidence - confidence).abs() > f64::EPSILON {
        reasoning.push_str("; confidence clamped to valid range");
    }

    let refined_query = value
        .get("refined_query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    AgentEvaluation {
        decision,
        confidence,
        reasoning,
        refined_query,
    }
}

fn preview(content: &str) -> &str {
    if content.len() <= CONTEXT_PREVIEW_CHARS {
        return content;
    }
    let mut end = CONTEXT_PREVIEW_CHARS;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_refinement() {
        let e = parse_evaluation(
            r#"{"decision": "refine_query", "confidence": 0.4, "reasoning": "too vague", "refined_query": "marketing strategy 2024"}"#,
        );
        assert_eq!(e.decision, AgentDecision::RefineQuery);
        assert_eq!(e.refined_query.as_deref(), Some("marketing strategy 2024"));
    }

    #[test]
    fn empty_refined_query_becomes_none() {
        let e = parse_evaluation(
            r#"{"decision": "refine_query", "confidence": 0.4, "reasoning": "r", "refined_query": "  "}"#,
        );
        assert_eq!(e.decision, AgentDecision::RefineQuery);
        assert!(e.refined_query.is_none());
    }

    #[test]
    fn out_of_range_confidence_is_clamped_with_a_note() {
        let e = parse_evaluation(
            r#"{"decision": "proceed", "confidence": 1.7, "reasoning": "sure"}"#,
        );
        assert!((e.confidence - 1.0).abs() < 1e-12);
        assert!(e.reasoning.contains("clamped"));
    }

    #[test]
    fn unknown_decision_coerces_to_proceed() {
        let e = parse_evaluation(r#"{"decision": "give_up", "confidence": 0.2, "reasoning": "?"}"#);
        assert_eq!(e.decision, AgentDecision::Proceed);
    }

    #[test]
    fn garbage_recovers_to_safe_default() {
        let e = parse_evaluation("I think we should probably proceed");
        assert_eq!(e.decision, AgentDecision::Proceed);
        assert!((e.confidence - 0.5).abs() < 1e-12);
        assert_eq!(e.reasoning, "parse_failed");
    }
}
