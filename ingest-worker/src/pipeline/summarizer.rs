//! Hierarchical document summarization using a map-reduce approach.
//!
//! Short documents get a single chat call; long documents are split into
//! sections, each section is summarized in parallel under a concurrency
//! bound (MAP), and the section summaries are combined into the final
//! summary (REDUCE). Section order in the result always matches input order
//! regardless of completion order.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use doc_base::{
    Chat, ChatRequest, DocumentSummaries, DocumentTree, PortError, RuntimeSettings,
    SectionSummary, SummaryMethod,
};

use crate::prompts;

const SECTION_SUMMARY_MAX_TOKENS: u32 = 400;
const FINAL_SUMMARY_MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.3;

/// One splittable unit produced by the section splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSection {
    pub title: String,
    pub content: String,
}

/// Hierarchical summarizer over the chat port.
pub struct Summarizer {
    chat: Arc<dyn Chat>,
    settings: RuntimeSettings,
}

impl Summarizer {
    pub fn new(chat: Arc<dyn Chat>, settings: RuntimeSettings) -> Self {
        Self { chat, settings }
    }

    /// Generates document and section summaries.
    ///
    /// Method selection is size-based: documents at or under
    /// `summarizer_short_doc_threshold` characters use a single call.
    ///
    /// # Errors
    /// Any MAP or REDUCE chat failure propagates; no partial summaries are
    /// returned.
    pub async fn summarize(&self, tree: &DocumentTree) -> Result<DocumentSummaries, PortError> {
        let full_text = tree.full_text();
        let text_length = full_text.len();

        if full_text.trim().is_empty() {
            debug!("empty document, skipping summarization");
            return Ok(DocumentSummaries {
                document_summary: String::new(),
                section_summaries: Vec::new(),
                method: SummaryMethod::Single,
                sections_count: 0,
            });
        }

        if text_length <= self.settings.summarizer_short_doc_threshold {
            info!(text_length, "using single summary method (short document)");
            self.summarize_short(tree, &full_text).await
        } else {
            info!(text_length, "using map-reduce method (long document)");
            self.summarize_map_reduce(tree, &full_text).await
        }
    }

    async fn summarize_short(
        &self,
        tree: &DocumentTree,
        full_text: &str,
    ) -> Result<DocumentSummaries, PortError> {
        let template = self
            .settings
            .prompt_summary
            .as_deref()
            .unwrap_or(prompts::SHORT_DOC_SUMMARY_USER);
        let user = prompts::render(
            template,
            &[
                ("document_title", &tree.title),
                ("document_type", &tree.doc_type),
                ("document_content", full_text),
            ],
        );

        let summary = self
            .chat
            .complete(ChatRequest {
                system: prompts::SHORT_DOC_SUMMARY_SYSTEM,
                user: &user,
                max_tokens: FINAL_SUMMARY_MAX_TOKENS,
                temperature: TEMPERATURE,
                json_mode: false,
            })
            .await?;

        Ok(DocumentSummaries {
            document_summary: summary,
            section_summaries: Vec::new(),
            method: SummaryMethod::Single,
            sections_count: 0,
        })
    }

    async fn summarize_map_reduce(
        &self,
        tree: &DocumentTree,
        full_text: &str,
    ) -> Result<DocumentSummaries, PortError> {
        let sections = self.split_into_sections(tree, full_text);
        info!(section_count = sections.len(), "map phase starting");

        let section_summaries = self.map_summarize(&sections).await?;

        debug!(
            summaries = section_summaries.len(),
            "map phase complete, reducing"
        );
        let document_summary = self.reduce(tree, &section_summaries).await?;

        Ok(DocumentSummaries {
            document_summary,
            sections_count: sections.len(),
            section_summaries,
            method: SummaryMethod::MapReduce,
        })
    }

    /// Splits the tree into summarizable sections.
    ///
    /// Preference order: the tree's own top-level sections (skipping ones
    /// under `min_section_size`, splitting ones over `max_section_size` on
    /// paragraph boundaries); falling back to size-based splitting of the
    /// full text when no structured sections exist.
    pub fn split_into_sections(&self, tree: &DocumentTree, full_text: &str) -> Vec<SplitSection> {
        let min = self.settings.summarizer_min_section_size;
        let max = self.settings.summarizer_max_section_size;

        let mut sections = Vec::new();
        for idx in tree.root_sections() {
            let node = tree.node(idx);
            let title = node.title.clone().unwrap_or_else(|| "Untitled Section".into());
            let content = tree.node_text(idx);

            if content.len() < min {
                debug!(%title, length = content.len(), "skipping short section");
                continue;
            }
            if content.len() > max {
                sections.extend(split_long_section(&title, &content, max));
            } else {
                sections.push(SplitSection { title, content });
            }
        }

        if sections.is_empty() {
            warn!("no structured sections found, using size-based splitting");
            sections = split_by_size(full_text, max);
        }
        sections
    }

    /// MAP: summarize sections in parallel under the concurrency bound,
    /// reassembling results in input order.
    async fn map_summarize(
        &self,
        sections: &[SplitSection],
    ) -> Result<Vec<SectionSummary>, PortError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.summarizer_max_concurrent.max(1)));

        let tasks = sections.iter().enumerate().map(|(index, section)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| PortError::Config("summarizer semaphore closed".into()))?;
                debug!(index, title = %section.title, "summarizing section");
                self.summarize_section(section).await
            }
        });

        // try_join_all keeps input order; a failed section cancels the rest.
        try_join_all(tasks).await
    }

    async fn summarize_section(&self, section: &SplitSection) -> Result<SectionSummary, PortError> {
        let max = self.settings.summarizer_max_section_size;
        let content = truncate_chars(&section.content, max);
        let user = prompts::render(
            prompts::SECTION_SUMMARY_USER,
            &[
                ("section_title", section.title.as_str()),
                ("section_content", content),
            ],
        );

        let summary = self
            .chat
            .complete(ChatRequest {
                system: prompts::SECTION_SUMMARY_SYSTEM,
                user: &user,
                max_tokens: SECTION_SUMMARY_MAX_TOKENS,
                temperature: TEMPERATURE,
                json_mode: false,
            })
            .await?;

        Ok(SectionSummary {
            title: section.title.clone(),
            summary,
            original_length: section.content.len(),
        })
    }

    /// REDUCE: combine the ordered section summaries into the final summary.
    async fn reduce(
        &self,
        tree: &DocumentTree,
        section_summaries: &[SectionSummary],
    ) -> Result<String, PortError> {
        let formatted = section_summaries
            .iter()
            .map(|s| format!("### {}\n{}", s.title, s.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = prompts::render(
            prompts::FINAL_SUMMARY_USER,
            &[
                ("document_title", tree.title.as_str()),
                ("document_type", tree.doc_type.as_str()),
                ("section_summaries", formatted.as_str()),
            ],
        );

        self.chat
            .complete(ChatRequest {
                system: prompts::FINAL_SUMMARY_SYSTEM,
                user: &user,
                max_tokens: FINAL_SUMMARY_MAX_TOKENS,
                temperature: TEMPERATURE,
                json_mode: false,
            })
            .await
    }
}

/// Splits an oversized section on paragraph boundaries into parts titled
/// `"<title> (Part k)"`.
fn split_long_section(title: &str, content: &str, max_size: usize) -> Vec<SplitSection> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut part_num = 1usize;

    for para in content.split("\n\n") {
        if !current.is_empty() && current.len() + para.len() > max_size {
            parts.push(SplitSection {
                title: format!("{title} (Part {part_num})"),
                content: current.trim().to_string(),
            });
            current = para.to_string();
            part_num += 1;
        } else if current.is_empty() {
            current = para.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(para);
        }
    }

    if !current.trim().is_empty() {
        let part_title = if part_num > 1 {
            format!("{title} (Part {part_num})")
        } else {
            title.to_string()
        };
        parts.push(SplitSection {
            title: part_title,
            content: current.trim().to_string(),
        });
    }
    parts
}

/// Size-based fallback: accumulate paragraphs until the limit, flushing as
/// `"Section k"`.
fn split_by_size(text: &str, max_size: usize) -> Vec<SplitSection> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut section_num = 1usize;

    for para in text.split("\n\n") {
        if !current.is_empty() && current.len() + para.len() > max_size {
            sections.push(SplitSection {
                title: format!("Section {section_num}"),
                content: current.trim().to_string(),
            });
            current = para.to_string();
            section_num += 1;
        } else if current.is_empty() {
            current = para.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(para);
        }
    }

    if !current.trim().is_empty() {
        sections.push(SplitSection {
            title: format!("Section {section_num}"),
            content: current.trim().to_string(),
        });
    }
    sections
}

/// Cuts at a char boundary at or below `max` bytes.
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doc_base::NodeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Chat fake: replies with a tag derived from the prompt, optionally
    /// delaying early calls to scramble completion order.
    struct EchoChat {
        delay_first: bool,
        calls: AtomicUsize,
        max_in_flight: AtomicUsize,
        in_flight: AtomicUsize,
    }

    impl EchoChat {
        fn new(delay_first: bool) -> Self {
            Self {
                delay_first,
                calls: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Chat for EchoChat {
        async fn complete(&self, req: ChatRequest<'_>) -> Result<String, PortError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // First call finishes last so completion order differs from
            // submission order.
            if self.delay_first && call == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let tag = req
                .user
                .lines()
                .find(|l| l.starts_with("Section ") || l.contains("Part") || !l.is_empty())
                .unwrap_or("")
                .to_string();
            Ok(format!("summary of [{tag}]"))
        }
    }

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            summarizer_short_doc_threshold: 100,
            summarizer_min_section_size: 10,
            summarizer_max_section_size: 500,
            summarizer_max_concurrent: 2,
            ..RuntimeSettings::default()
        }
    }

    fn tree_with_sections(sections: &[(&str, usize)]) -> DocumentTree {
        let mut tree = DocumentTree::new("doc.pdf", "application/pdf");
        for (title, body_len) in sections {
            let s = tree.push_child(
                tree.root(),
                NodeKind::Section,
                String::new(),
                Some(title.to_string()),
                Some(2),
                Some(1),
            );
            tree.push_child(
                s,
                NodeKind::Paragraph,
                format!("{title} ").repeat(body_len / (title.len() + 1) + 1),
                None,
                None,
                Some(1),
            );
        }
        tree
    }

    #[tokio::test]
    async fn short_document_uses_single_method() {
        let chat = Arc::new(EchoChat::new(false));
        let summarizer = Summarizer::new(chat, settings());

        let mut tree = DocumentTree::new("t.txt", "text/plain");
        tree.push_child(
            tree.root(),
            NodeKind::Paragraph,
            "tiny body".into(),
            None,
            None,
            Some(1),
        );

        let out = summarizer.summarize(&tree).await.unwrap();
        assert_eq!(out.method, SummaryMethod::Single);
        assert!(out.section_summaries.is_empty());
        assert_eq!(out.sections_count, 0);
        assert!(!out.document_summary.is_empty());
    }

    #[tokio::test]
    async fn empty_document_yields_empty_summary_without_chat() {
        let chat = Arc::new(EchoChat::new(false));
        let calls = chat.calls.load(Ordering::SeqCst);
        let summarizer = Summarizer::new(chat.clone(), settings());

        let tree = DocumentTree::new("empty.txt", "text/plain");
        let out = summarizer.summarize(&tree).await.unwrap();
        assert_eq!(out.method, SummaryMethod::Single);
        assert!(out.document_summary.is_empty());
        assert_eq!(chat.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn map_reduce_keeps_input_order_despite_completion_order() {
        let chat = Arc::new(EchoChat::new(true));
        let summarizer = Summarizer::new(chat.clone(), settings());

        let tree = tree_with_sections(&[("First", 120), ("Second", 120), ("Third", 120)]);
        let out = summarizer.summarize(&tree).await.unwrap();

        assert_eq!(out.method, SummaryMethod::MapReduce);
        assert_eq!(out.sections_count, 3);
        let titles: Vec<&str> = out
            .section_summaries
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn map_respects_concurrency_bound() {
        let chat = Arc::new(EchoChat::new(false));
        let summarizer = Summarizer::new(chat.clone(), settings());

        let tree = tree_with_sections(&[("A", 120), ("B", 120), ("C", 120), ("D", 120), ("E", 120)]);
        summarizer.summarize(&tree).await.unwrap();
        assert!(chat.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn method_selection_flips_exactly_past_the_threshold() {
        let chat = Arc::new(EchoChat::new(false));
        let summarizer = Summarizer::new(chat, settings());

        // full_text() of a single root paragraph is exactly its content.
        let mut at_threshold = DocumentTree::new("a.txt", "text/plain");
        at_threshold.push_child(
            at_threshold.root(),
            NodeKind::Paragraph,
            "z".repeat(100),
            None,
            None,
            Some(1),
        );
        let out = summarizer.summarize(&at_threshold).await.unwrap();
        assert_eq!(out.method, SummaryMethod::Single);

        let mut over_threshold = DocumentTree::new("b.txt", "text/plain");
        over_threshold.push_child(
            over_threshold.root(),
            NodeKind::Paragraph,
            "z".repeat(101),
            None,
            None,
            Some(1),
        );
        let out = summarizer.summarize(&over_threshold).await.unwrap();
        assert_eq!(out.method, SummaryMethod::MapReduce);
        assert!(out.sections_count >= 1);
    }

    #[test]
    fn long_sections_split_on_paragraph_boundaries() {
        let para = "x".repeat(200);
        let content = format!("{para}\n\n{para}\n\n{para}");
        let parts = split_long_section("Big", &content, 450);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].title, "Big (Part 1)");
        assert_eq!(parts[1].title, "Big (Part 2)");
        assert!(parts.iter().all(|p| p.content.len() <= 450));
    }

    #[test]
    fn size_based_fallback_numbers_sections() {
        let para = "y".repeat(300);
        let text = format!("{para}\n\n{para}");
        let sections = split_by_size(&text, 400);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Section 1");
        assert_eq!(sections[1].title, "Section 2");
    }
}
