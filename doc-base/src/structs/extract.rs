//! Extractor output consumed by the tree builder.

use serde::{Deserialize, Serialize};

/// Structural role of an extracted block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Document title (role="title" in layout extractors).
    Title,
    /// Section heading with its nesting depth (1-based).
    Heading { depth: usize },
    Paragraph,
    /// Table with positional rows.
    Table { rows: Vec<Vec<String>> },
}

/// One block of extractor output, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedBlock {
    pub kind: BlockKind,
    pub text: String,
    pub page_number: Option<u32>,
}

/// An image region detected by the extractor. `reading_order` is the number
/// of blocks preceding the region in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegion {
    pub reading_order: usize,
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing)]
    pub bytes: Vec<u8>,
}

/// Full structure-extraction result for a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub blocks: Vec<ExtractedBlock>,
    pub image_regions: Vec<ImageRegion>,
}
