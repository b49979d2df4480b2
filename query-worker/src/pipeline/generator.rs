//! Grounded answer generation with numbered citations.
//!
//! The final reranked context is numbered `[1]..[n]` in the prompt; the
//! model is instructed to cite inline. Citations are extracted in order of
//! first appearance in the answer; each refers back to a context chunk and
//! carries its document name and hierarchy location.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use doc_base::{Chat, ChatRequest, Citation, MetaStore, PortError};

use super::reranker::RerankedChunk;

const GENERATION_MAX_TOKENS: u32 = 500;
const GENERATION_TEMPERATURE: f32 = 0.3;

const GENERATOR_SYSTEM: &str = "You are a helpful assistant that answers questions based on \
provided context. Always cite your sources using [1], [2], etc.";

/// Answer plus extracted citations.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Chat-backed answer generator.
pub struct AnswerGenerator {
    chat: Arc<dyn Chat>,
    meta: Arc<dyn MetaStore>,
}

impl AnswerGenerator {
    pub fn new(chat: Arc<dyn Chat>, meta: Arc<dyn MetaStore>) -> Self {
        Self { chat, meta }
    }

    /// Generates the final answer from the reranked context.
    ///
    /// # Errors
    /// Transport failures propagate and terminate the query; citation
    /// extraction never fails (a missing document name degrades to an empty
    /// string, an unciteable answer to an empty list).
    pub async fn generate(
        &self,
        query: &str,
        context: &[RerankedChunk],
    ) -> Result<GeneratedAnswer, PortError> {
        if context.is_empty() {
            return Ok(GeneratedAnswer {
                answer: "I don't have enough information to answer this question.".into(),
                citations: Vec::new(),
            });
        }

        let numbered = context
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let user = format!(
            "Answer the question based on the provided context. Include citation numbers \
             [1], [2], etc. when referencing specific information.\n\n\
             Question: {query}\n\nContext:\n{numbered}\n\nAnswer (with citations):"
        );

        let answer = self
            .chat
            .complete(ChatRequest {
                system: GENERATOR_SYSTEM,
                user: &user,
                max_tokens: GENERATION_MAX_TOKENS,
                temperature: GENERATION_TEMPERATURE,
                json_mode: false,
            })
            .await?;

        let citations = self.extract_citations(&answer, context).await;
        info!(citations = citations.len(), "answer generated");
        Ok(GeneratedAnswer { answer, citations })
    }

    /// Citations ordered by first appearance; repeated appearances share the
    /// same number.
    async fn extract_citations(&self, answer: &str, context: &[RerankedChunk]) -> Vec<Citation> {
        let mut names: HashMap<Uuid, String> = HashMap::new();
        let mut citations = Vec::new();

        for n in cited_ordinals(answer) {
            let Some(chunk) = context.get(n - 1) else {
                continue;
            };
            let doc_id = chunk.chunk.doc_id;
            let document_name = match names.get(&doc_id) {
                Some(name) => name.clone(),
                None => {
                    let name = match self.meta.document(doc_id).await {
                        Ok(Some(doc)) => doc.filename,
                        Ok(None) => String::new(),
                        Err(e) => {
                            warn!(%doc_id, error = %e, "document name lookup failed");
                            String::new()
                        }
                    };
                    names.insert(doc_id, name.clone());
                    name
                }
            };

            citations.push(Citation {
                n,
                chunk_id: chunk.chunk.chunk_id,
                document_id: doc_id,
                document_name,
                hierarchy_path: chunk.chunk.hierarchy_path.clone(),
                page_number: chunk.chunk.page_number,
            });
        }
        citations
    }
}

/// Distinct `[n]` ordinals in order of first appearance.
fn cited_ordinals(answer: &str) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::new();
    let bytes = answer.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b']' {
                if let Ok(n) = answer[i + 1..j].parse::<usize>() {
                    if n >= 1 && !out.contains(&n) {
                        out.push(n);
                    }
                }
                i = j;
            }
        }
        i += 1;
    }
    out
}
