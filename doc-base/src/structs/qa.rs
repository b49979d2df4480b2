//! Question/answer pair model.

use serde::{Deserialize, Serialize};

/// Question categories requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaKind {
    Factual,
    Overview,
    Procedural,
    Comparison,
    Reasoning,
}

impl QaKind {
    /// Parses a loosely formatted type name; unknown values coerce to
    /// `Factual`.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "overview" => QaKind::Overview,
            "procedural" => QaKind::Procedural,
            "comparison" => QaKind::Comparison,
            "reasoning" => QaKind::Reasoning,
            _ => QaKind::Factual,
        }
    }
}

/// One synthesized question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub kind: QaKind,
}
