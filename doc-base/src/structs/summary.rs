//! Summarization result model.

use serde::{Deserialize, Serialize};

/// Summarization method actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    Single,
    MapReduce,
}

/// MAP-phase output for one splittable section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub title: String,
    pub summary: String,
    pub original_length: usize,
}

/// Complete summarization result for a document.
///
/// `method == Single` implies `section_summaries` is empty and
/// `sections_count` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummaries {
    pub document_summary: String,
    pub section_summaries: Vec<SectionSummary>,
    pub method: SummaryMethod,
    pub sections_count: usize,
}
