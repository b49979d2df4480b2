//! Q&A pair synthesis over the chat port.
//!
//! One JSON-mode chat call per document; malformed items are dropped rather
//! than failing the pipeline, and near-duplicate questions are suppressed
//! before truncating to the requested count.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use doc_base::{json_repair, Chat, ChatRequest, DocumentTree, PortError, QaKind, QaPair};

use crate::prompts;

const QA_MAX_TOKENS: u32 = 2000;
const QA_TEMPERATURE: f32 = 0.5;
/// Content cap fed to the prompt.
const QA_CONTENT_MAX_CHARS: usize = 15_000;

/// Q&A generator over the chat port.
pub struct QaGenerator {
    chat: Arc<dyn Chat>,
    prompt_override: Option<String>,
}

impl QaGenerator {
    pub fn new(chat: Arc<dyn Chat>, prompt_override: Option<String>) -> Self {
        Self {
            chat,
            prompt_override,
        }
    }

    /// Generates up to `num_questions` diverse pairs.
    ///
    /// Never fails on malformed model output: unparseable envelopes yield an
    /// empty list, unparseable items are skipped, unknown types coerce to
    /// `factual`. Only transport-level chat errors propagate.
    pub async fn generate(
        &self,
        tree: &DocumentTree,
        num_questions: usize,
    ) -> Result<Vec<QaPair>, PortError> {
        let full_text = tree.full_text();
        if full_text.trim().is_empty() || num_questions == 0 {
            debug!("nothing to generate Q&A from");
            return Ok(Vec::new());
        }

        let mut content = full_text;
        if content.len() > QA_CONTENT_MAX_CHARS {
            let mut end = QA_CONTENT_MAX_CHARS;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content.truncate(end);
            content.push_str("\n\n[Document truncated]");
        }

        let template = self
            .prompt_override
            .as_deref()
            .unwrap_or(prompts::QA_USER);
        let n = num_questions.to_string();
        let user = prompts::render(
            template,
            &[
                ("num_questions", n.as_str()),
                ("document_title", tree.title.as_str()),
                ("document_type", tree.doc_type.as_str()),
                ("document_content", content.as_str()),
            ],
        );

        let raw = self
            .chat
            .complete(ChatRequest {
                system: prompts::QA_SYSTEM,
                user: &user,
                max_tokens: QA_MAX_TOKENS,
                temperature: QA_TEMPERATURE,
                json_mode: true,
            })
            .await?;

        let pairs = parse_pairs(&raw);
        let deduplicated = deduplicate(pairs);
        let truncated: Vec<QaPair> = deduplicated.into_iter().take(num_questions).collect();
        info!(count = truncated.len(), "Q&A generation complete");
        Ok(truncated)
    }
}

/// Parses the `{"qa_pairs": [...]}` envelope, dropping malformed items.
fn parse_pairs(raw: &str) -> Vec<QaPair> {
    let Some(value) = json_repair::extract_json(raw) else {
        warn!("Q&A response contained no JSON, continuing with zero pairs");
        return Vec::new();
    };

    let items = match &value {
        Value::Object(map) => map.get("qa_pairs").and_then(|v| v.as_array()).cloned(),
        Value::Array(items) => Some(items.clone()),
        _ => None,
    };
    let Some(items) = items else {
        warn!("Q&A response missing qa_pairs array");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let question = obj.get("question")?.as_str()?.trim().to_string();
            let answer = obj.get("answer")?.as_str()?.trim().to_string();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            let kind = obj
                .get("type")
                .and_then(|v| v.as_str())
                .map(QaKind::from_loose)
                .unwrap_or(QaKind::Factual);
            Some(QaPair {
                question,
                answer,
                kind,
            })
        })
        .collect()
}

/// Removes duplicate or very similar questions (case-folded exact match, or
/// substring containment with a close length).
fn deduplicate(pairs: Vec<QaPair>) -> Vec<QaPair> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for pair in pairs {
        let q = pair.question.to_lowercase();
        let duplicate = seen.iter().any(|s| {
            s == &q
                || ((s.contains(&q) || q.contains(s)) && s.len().abs_diff(q.len()) < 10)
        });
        if !duplicate {
            seen.push(q);
            out.push(pair);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_envelope_and_coerces_unknown_type() {
        let raw = r#"{"qa_pairs": [
            {"question": "What is it?", "answer": "A plan.", "type": "overview"},
            {"question": "When?", "answer": "Q3.", "type": "temporal"},
            {"question": "", "answer": "dropped"},
            {"answer": "no question"}
        ]}"#;
        let pairs = parse_pairs(raw);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].kind, QaKind::Overview);
        assert_eq!(pairs[1].kind, QaKind::Factual);
    }

    #[test]
    fn tolerates_markdown_fences() {
        let raw = "```json\n{\"qa_pairs\": [{\"question\": \"Q?\", \"answer\": \"A.\", \"type\": \"factual\"}]}\n```";
        assert_eq!(parse_pairs(raw).len(), 1);
    }

    #[test]
    fn garbage_yields_zero_pairs() {
        assert!(parse_pairs("I could not produce JSON, sorry").is_empty());
    }

    #[test]
    fn near_duplicate_questions_are_suppressed() {
        let pairs = vec![
            QaPair {
                question: "What is the revenue?".into(),
                answer: "1M".into(),
                kind: QaKind::Factual,
            },
            QaPair {
                question: "what is the revenue".into(),
                answer: "1M".into(),
                kind: QaKind::Factual,
            },
            QaPair {
                question: "Why did costs rise?".into(),
                answer: "Hiring".into(),
                kind: QaKind::Reasoning,
            },
        ];
        let out = deduplicate(pairs);
        assert_eq!(out.len(), 2);
    }
}
