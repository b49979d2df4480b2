//! Semantic chunking with configurable size and overlap.
//!
//! Tokens are whitespace words (`token_count_method = "estimated"`). Leaves
//! are flattened in document order and accumulated into chunks of at most
//! `chunk_size` tokens; consecutive chunks share `chunk_overlap` tokens on
//! the boundary. A leaf that would overflow closes the current chunk at the
//! previous sentence boundary when at least 60% of the target size is
//! reached, and at the token boundary otherwise.
//!
//! When the document is large and carries enough section headers, a
//! hierarchical pass additionally emits one parent chunk per top-level
//! section (heading + short summary, child ids in `metadata.children`).
//! That pass is the only place the chunker may call the chat port.

use tracing::{debug, info, warn};
use uuid::Uuid;

use doc_base::{
    Chat, ChatRequest, Chunk, ChunkMetadata, DocumentTree, LanguageProfile, LanguageTagger,
    PortError, RuntimeSettings, TokenCountMethod,
};

use crate::prompts;

const PARENT_SUMMARY_MAX_TOKENS: u32 = 150;
const PARENT_SUMMARY_TEMPERATURE: f32 = 0.2;

/// Token-window chunker.
pub struct Chunker {
    settings: RuntimeSettings,
}

impl Chunker {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self { settings }
    }

    /// Produces `text_chunk` records for a document tree. Summary and Q&A
    /// chunks are materialized by the orchestrator.
    pub async fn chunk(
        &self,
        tree: &DocumentTree,
        doc_id: Uuid,
        tagger: &dyn LanguageTagger,
        chat: Option<&dyn Chat>,
    ) -> Result<Vec<Chunk>, PortError> {
        let mut builder = WindowBuilder::new(self.settings.chunk_size, self.settings.chunk_overlap);

        for leaf_idx in tree.leaves() {
            let leaf = tree.node(leaf_idx);
            if leaf.content.trim().is_empty() {
                continue;
            }
            builder.push_leaf(&leaf.content, &leaf.hierarchy_path, leaf.page_number);
        }
        let windows = builder.finish();

        let mut chunks: Vec<Chunk> = windows
            .into_iter()
            .map(|w| {
                let content = w.tokens.join(" ");
                let profile = tag(tagger, &content);
                Chunk {
                    chunk_id: Uuid::new_v4(),
                    doc_id,
                    hierarchy_path: w.hierarchy_path,
                    page_number: w.page_number,
                    language: profile.primary_language.clone(),
                    is_multilingual: profile.is_multilingual,
                    languages: profile.languages.clone(),
                    language_distribution: profile.distribution.clone(),
                    metadata: ChunkMetadata::TextChunk {
                        token_count: w.tokens.len(),
                        token_count_method: TokenCountMethod::Estimated,
                        children: None,
                    },
                    content,
                }
            })
            .collect();

        info!(doc_id = %doc_id, text_chunks = chunks.len(), "chunking complete");

        if self.hierarchical_applies(tree) {
            let parents = self
                .build_parent_chunks(tree, doc_id, tagger, chat, &chunks)
                .await?;
            debug!(parents = parents.len(), "hierarchical parent chunks added");
            chunks.extend(parents);
        }

        Ok(chunks)
    }

    fn hierarchical_applies(&self, tree: &DocumentTree) -> bool {
        tree.full_text().len() > self.settings.hierarchical_threshold_chars
            && tree.root_sections().len() >= self.settings.min_headers_for_semantic
    }

    /// One parent chunk per top-level section: the heading plus a short
    /// summary, referencing the section's child chunk ids.
    async fn build_parent_chunks(
        &self,
        tree: &DocumentTree,
        doc_id: Uuid,
        tagger: &dyn LanguageTagger,
        chat: Option<&dyn Chat>,
        text_chunks: &[Chunk],
    ) -> Result<Vec<Chunk>, PortError> {
        let max_tokens = self.settings.parent_chunk_multiplier * self.settings.chunk_size;
        let mut parents = Vec::new();

        for section_idx in tree.root_sections() {
            let node = tree.node(section_idx);
            let Some(title) = node.title.clone() else {
                continue;
            };

            let children: Vec<Uuid> = text_chunks
                .iter()
                .filter(|c| c.hierarchy_path.first() == Some(&title))
                .map(|c| c.chunk_id)
                .collect();
            if children.is_empty() {
                continue;
            }

            let section_text = tree.node_text(section_idx);
            let summary = self
                .parent_summary(chat, &title, &section_text)
                .await;

            let mut content = format!("{title}\n\n{summary}");
            let token_count = {
                let tokens: Vec<&str> = content.split_whitespace().collect();
                if tokens.len() > max_tokens {
                    content = tokens[..max_tokens].join(" ");
                    max_tokens
                } else {
                    tokens.len()
                }
            };

            let profile = tag(tagger, &content);
            parents.push(Chunk {
                chunk_id: Uuid::new_v4(),
                doc_id,
                hierarchy_path: vec![title],
                page_number: node.page_number,
                language: profile.primary_language.clone(),
                is_multilingual: profile.is_multilingual,
                languages: profile.languages.clone(),
                language_distribution: profile.distribution.clone(),
                metadata: ChunkMetadata::TextChunk {
                    token_count,
                    token_count_method: TokenCountMethod::Estimated,
                    children: Some(children),
                },
                content,
            });
        }

        Ok(parents)
    }

    /// Short section summary via chat when available, first paragraph
    /// otherwise; chat failures fall back rather than failing the job.
    async fn parent_summary(&self, chat: Option<&dyn Chat>, title: &str, text: &str) -> String {
        let max_len = self.settings.parent_summary_max_length;

        if let Some(chat) = chat {
            let user = format!("Summarize the section \"{title}\" in one or two sentences:\n\n{text}");
            match chat
                .complete(ChatRequest {
                    system: prompts::PARENT_SUMMARY_SYSTEM,
                    user: &user,
                    max_tokens: PARENT_SUMMARY_MAX_TOKENS,
                    temperature: PARENT_SUMMARY_TEMPERATURE,
                    json_mode: false,
                })
                .await
            {
                Ok(summary) => return truncate_chars(summary.trim(), max_len).to_string(),
                Err(e) => warn!(error = %e, "parent summary chat failed, using first paragraph"),
            }
        }

        let first_para = text.split("\n\n").next().unwrap_or("");
        truncate_chars(first_para.trim(), max_len).to_string()
    }
}

fn tag(tagger: &dyn LanguageTagger, content: &str) -> LanguageProfile {
    // The tagger needs at least one word of input.
    if content.split_whitespace().next().is_some() {
        tagger.analyze(content)
    } else {
        LanguageProfile::unknown()
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One accumulated token window.
struct Window {
    tokens: Vec<String>,
    hierarchy_path: Vec<String>,
    page_number: Option<u32>,
}

/// Streaming accumulator over leaves.
struct WindowBuilder {
    chunk_size: usize,
    overlap: usize,
    tokens: Vec<String>,
    /// Paths and page of leaves contributing fresh (non-overlap) tokens.
    leaf_paths: Vec<Vec<String>>,
    first_page: Option<u32>,
    has_fresh: bool,
    out: Vec<Window>,
}

impl WindowBuilder {
    fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            tokens: Vec::new(),
            leaf_paths: Vec::new(),
            first_page: None,
            has_fresh: false,
            out: Vec::new(),
        }
    }

    fn push_leaf(&mut self, content: &str, path: &[String], page: Option<u32>) {
        for sentence in sentences(content) {
            let sent_tokens: Vec<&str> = sentence.split_whitespace().collect();
            if sent_tokens.is_empty() {
                continue;
            }

            // Sentence boundary rule: close early rather than splitting the
            // sentence, provided the window is full enough.
            let would_overflow = self.tokens.len() + sent_tokens.len() > self.chunk_size;
            let full_enough = self.tokens.len() as f64 >= 0.6 * self.chunk_size as f64;
            if would_overflow && self.has_fresh && full_enough {
                self.emit();
            }

            for token in sent_tokens {
                if self.tokens.len() == self.chunk_size {
                    self.emit();
                }
                if !self.has_fresh {
                    self.first_page = page;
                    self.has_fresh = true;
                }
                if self.leaf_paths.last().map(|p| p.as_slice()) != Some(path) {
                    self.leaf_paths.push(path.to_vec());
                }
                self.tokens.push(token.to_string());
            }
        }
    }

    fn emit(&mut self) {
        let hierarchy_path = shared_prefix(&self.leaf_paths);
        let window = Window {
            tokens: std::mem::take(&mut self.tokens),
            hierarchy_path,
            page_number: self.first_page,
        };

        // Seed the next window with the trailing overlap.
        let start = window.tokens.len().saturating_sub(self.overlap);
        self.tokens = window.tokens[start..].to_vec();
        self.leaf_paths.clear();
        self.first_page = None;
        self.has_fresh = false;

        self.out.push(window);
    }

    fn finish(mut self) -> Vec<Window> {
        // A trailing window that holds only overlap carry is not a chunk.
        if self.has_fresh && !self.tokens.is_empty() {
            self.emit();
        }
        self.out
    }
}

/// Hierarchy of a multi-leaf window: the deepest path prefix shared by every
/// contributing leaf.
fn shared_prefix(paths: &[Vec<String>]) -> Vec<String> {
    let Some(first) = paths.first() else {
        return Vec::new();
    };
    let mut prefix = first.clone();
    for path in &paths[1..] {
        let common = prefix
            .iter()
            .zip(path.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(common);
    }
    prefix
}

/// Splits text into sentences: a sentence ends after `.`, `!` or `?`
/// followed by whitespace, or at a newline.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            if !current.trim().is_empty() {
                out.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            if !current.trim().is_empty() {
                out.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::language::ScriptLanguageTagger;
    use doc_base::NodeKind;

    fn settings(chunk_size: usize, overlap: usize) -> RuntimeSettings {
        RuntimeSettings {
            chunk_size,
            chunk_overlap: overlap,
            ..RuntimeSettings::default()
        }
    }

    fn tree_with_paragraph(text: &str) -> DocumentTree {
        let mut tree = DocumentTree::new("t.txt", "text/plain");
        tree.push_child(
            tree.root(),
            NodeKind::Paragraph,
            text.to_string(),
            None,
            None,
            Some(1),
        );
        tree
    }

    fn token_count(chunk: &Chunk) -> usize {
        match &chunk.metadata {
            ChunkMetadata::TextChunk { token_count, .. } => *token_count,
            _ => panic!("expected text chunk"),
        }
    }

    fn words(chunk: &Chunk) -> Vec<&str> {
        chunk.content.split_whitespace().collect()
    }

    #[tokio::test]
    async fn small_document_yields_one_chunk() {
        let chunker = Chunker::new(settings(512, 50));
        let tree = tree_with_paragraph("Hello world. This is a test.");
        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world. This is a test.");
        assert_eq!(chunks[0].language, "en");
        assert_eq!(token_count(&chunks[0]), 6);
    }

    #[tokio::test]
    async fn adjacent_chunks_share_the_overlap() {
        let chunker = Chunker::new(settings(20, 5));
        let text: String = (0..100)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let tree = tree_with_paragraph(&text);
        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev = words(&pair[0]);
            let next = words(&pair[1]);
            assert_eq!(prev[prev.len() - 5..], next[..5]);
        }
    }

    #[tokio::test]
    async fn chunk_sizes_respect_bounds() {
        let chunker = Chunker::new(settings(20, 5));
        let text: String = (0..123)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let tree = tree_with_paragraph(&text);
        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            let count = token_count(chunk);
            assert!(count <= 20, "chunk {i} too large: {count}");
            if i + 1 < chunks.len() {
                assert!(count >= 12, "chunk {i} too small: {count}");
            }
        }
    }

    #[tokio::test]
    async fn closes_at_sentence_boundary_when_full_enough() {
        let chunker = Chunker::new(settings(20, 0));
        // First sentence 15 tokens (75%), second 10 tokens: the second must
        // not be split mid-sentence.
        let s1 = (0..15).map(|i| format!("a{i}")).collect::<Vec<_>>().join(" ") + ".";
        let s2 = (0..10).map(|i| format!("b{i}")).collect::<Vec<_>>().join(" ") + ".";
        let tree = tree_with_paragraph(&format!("{s1} {s2}"));
        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(token_count(&chunks[0]), 15);
        assert_eq!(token_count(&chunks[1]), 10);
        assert!(chunks[0].content.starts_with("a0"));
        assert!(chunks[1].content.starts_with("b0"));
    }

    #[tokio::test]
    async fn hierarchy_uses_shared_prefix_across_sections() {
        let chunker = Chunker::new(settings(50, 0));
        let mut tree = DocumentTree::new("d", "text/plain");
        let s1 = tree.push_child(
            tree.root(),
            NodeKind::Section,
            String::new(),
            Some("Alpha".into()),
            Some(2),
            None,
        );
        tree.push_child(s1, NodeKind::Paragraph, "one two three".into(), None, None, Some(1));
        let s2 = tree.push_child(
            tree.root(),
            NodeKind::Section,
            String::new(),
            Some("Beta".into()),
            Some(2),
            None,
        );
        tree.push_child(s2, NodeKind::Paragraph, "four five six".into(), None, None, Some(2));

        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        // Both leaves fit one window; sections diverge so the shared prefix
        // is empty, and the page comes from the first leaf.
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].hierarchy_path.is_empty());
        assert_eq!(chunks[0].page_number, Some(1));
    }

    #[tokio::test]
    async fn hierarchical_pass_emits_parent_chunks() {
        let mut s = settings(40, 5);
        s.hierarchical_threshold_chars = 100;
        s.min_headers_for_semantic = 2;
        s.parent_summary_max_length = 80;
        let chunker = Chunker::new(s);

        let mut tree = DocumentTree::new("big", "text/markdown");
        for title in ["One", "Two"] {
            let sec = tree.push_child(
                tree.root(),
                NodeKind::Section,
                String::new(),
                Some(title.into()),
                Some(2),
                Some(1),
            );
            let body = format!("{title} body sentence. ").repeat(20);
            tree.push_child(sec, NodeKind::Paragraph, body, None, None, Some(1));
        }

        let chunks = chunker
            .chunk(&tree, Uuid::new_v4(), &ScriptLanguageTagger, None)
            .await
            .unwrap();

        let parents: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| matches!(&c.metadata, ChunkMetadata::TextChunk { children: Some(_), .. }))
            .collect();
        assert_eq!(parents.len(), 2);
        for parent in parents {
            let ChunkMetadata::TextChunk { children: Some(children), .. } = &parent.metadata else {
                unreachable!();
            };
            assert!(!children.is_empty());
            // Every referenced child exists and belongs to the same section.
            for child_id in children {
                let child = chunks.iter().find(|c| c.chunk_id == *child_id).unwrap();
                assert_eq!(child.hierarchy_path.first(), parent.hierarchy_path.first());
            }
        }
    }

    #[test]
    fn sentence_splitter_handles_terminators() {
        let out = sentences("One two. Three four! Five?\nSix seven");
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].trim(), "One two.");
        assert_eq!(out[3].trim(), "Six seven");
    }
}
