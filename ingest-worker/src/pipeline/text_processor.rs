//! Local extraction path for plain text, Markdown and JSON uploads.
//!
//! These formats never go through the external extractor: the structure is
//! recovered here and fed to the tree builder in the same shape the
//! extractor port produces.

use serde_json::Value;
use tracing::{debug, warn};

use doc_base::{BlockKind, ExtractedBlock, ExtractedDocument, PortError};

/// MIME types handled locally.
pub fn supports(mime_type: &str) -> bool {
    matches!(
        normalized(mime_type),
        "text/plain" | "text/markdown" | "application/json"
    )
}

/// Extracts blocks from a text-family document.
///
/// - Markdown: `#`-prefixed lines become headings with their marker depth;
///   blank lines separate paragraphs.
/// - JSON: pretty-printed and treated as a single text body.
/// - Plain text: blank-line separated paragraphs.
pub fn process(bytes: &[u8], mime_type: &str) -> Result<ExtractedDocument, PortError> {
    let mime = normalized(mime_type);
    debug!(mime, size = bytes.len(), "text_processor::process");

    let content = String::from_utf8_lossy(bytes).into_owned();
    let content = match mime {
        "application/json" => format_json(&content),
        _ => content,
    };

    let blocks = match mime {
        "text/markdown" => markdown_blocks(&content),
        _ => paragraph_blocks(&content),
    };

    Ok(ExtractedDocument {
        blocks,
        image_regions: Vec::new(),
    })
}

fn normalized(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
}

/// Pretty-prints JSON for readability; invalid JSON passes through raw.
fn format_json(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(v) => serde_json::to_string_pretty(&v).unwrap_or_else(|_| content.to_string()),
        Err(e) => {
            warn!(error = %e, "invalid JSON upload, using raw content");
            content.to_string()
        }
    }
}

/// Blank-line separated paragraphs, single page.
fn paragraph_blocks(content: &str) -> Vec<ExtractedBlock> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| ExtractedBlock {
            kind: BlockKind::Paragraph,
            text: p.to_string(),
            page_number: Some(1),
        })
        .collect()
}

/// Markdown-aware blocks: headings become heading blocks with the marker
/// count as depth, everything else accumulates into paragraphs.
fn markdown_blocks(content: &str) -> Vec<ExtractedBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let mut flush = |current: &mut Vec<&str>, blocks: &mut Vec<ExtractedBlock>| {
        if !current.is_empty() {
            blocks.push(ExtractedBlock {
                kind: BlockKind::Paragraph,
                text: current.join("\n"),
                page_number: Some(1),
            });
            current.clear();
        }
    };

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            flush(&mut current, &mut blocks);
        } else if stripped.starts_with('#') {
            flush(&mut current, &mut blocks);
            let depth = stripped.chars().take_while(|&c| c == '#').count();
            let title = stripped.trim_start_matches('#').trim();
            if !title.is_empty() {
                blocks.push(ExtractedBlock {
                    kind: if depth == 1 {
                        BlockKind::Title
                    } else {
                        BlockKind::Heading { depth }
                    },
                    text: title.to_string(),
                    page_number: Some(1),
                });
            }
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut blocks);

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_on_blank_lines() {
        let doc = process(b"first paragraph\n\nsecond paragraph", "text/plain").unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert!(matches!(doc.blocks[0].kind, BlockKind::Paragraph));
        assert_eq!(doc.blocks[1].text, "second paragraph");
    }

    #[test]
    fn markdown_headings_carry_depth() {
        let md = b"# Title\n\nintro text\n\n## Section A\n\nbody a\nline two\n\n### Deep\n\nbody b";
        let doc = process(md, "text/markdown").unwrap();

        assert!(matches!(doc.blocks[0].kind, BlockKind::Title));
        assert_eq!(doc.blocks[0].text, "Title");
        assert!(matches!(doc.blocks[2].kind, BlockKind::Heading { depth: 2 }));
        assert_eq!(doc.blocks[3].text, "body a\nline two");
        assert!(matches!(doc.blocks[4].kind, BlockKind::Heading { depth: 3 }));
    }

    #[test]
    fn json_is_pretty_printed() {
        let doc = process(br#"{"a":1}"#, "application/json").unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert!(doc.blocks[0].text.contains("\"a\": 1"));
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert!(supports("text/plain; charset=utf-8"));
        assert!(!supports("application/pdf"));
    }
}
