//! Builds the document tree from extractor output and image descriptions.
//!
//! Walks blocks in reading order while maintaining a stack of open sections
//! by heading depth: a heading of depth `d` closes any section of depth >= d
//! and opens a new one. Paragraphs and tables attach to the innermost open
//! section; image regions are inserted at their reading-order position with
//! the vision-produced caption as content.

use std::collections::HashMap;

use tracing::{debug, info};

use doc_base::{
    structs::tree::render_table_rows, BlockKind, DocumentTree, ExtractedDocument, NodeKind,
};

/// Builds an immutable tree for the rest of the pipeline.
///
/// `image_descriptions` maps an image region's `reading_order` to the
/// caption produced for it; regions without a caption are dropped.
pub fn build(
    title: &str,
    mime_type: &str,
    extracted: &ExtractedDocument,
    image_descriptions: &HashMap<usize, String>,
) -> DocumentTree {
    let mut tree = DocumentTree::new(title, mime_type);

    // Images grouped by the block index they precede.
    let mut images_at: HashMap<usize, Vec<(usize, Option<u32>)>> = HashMap::new();
    for region in &extracted.image_regions {
        images_at
            .entry(region.reading_order)
            .or_default()
            .push((region.reading_order, region.page_number));
    }

    // Stack of (node index, heading depth) for open sections.
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let root = tree.root();

    let mut place_images = |tree: &mut DocumentTree, stack: &[(usize, usize)], at: usize| {
        if let Some(regions) = images_at.get(&at) {
            let parent = stack.last().map(|&(idx, _)| idx).unwrap_or(root);
            for &(order, page) in regions {
                if let Some(caption) = image_descriptions.get(&order) {
                    if !caption.is_empty() {
                        tree.push_child(
                            parent,
                            NodeKind::ImageDescription,
                            caption.clone(),
                            None,
                            None,
                            page,
                        );
                    }
                }
            }
        }
    };

    for (i, block) in extracted.blocks.iter().enumerate() {
        place_images(&mut tree, &stack, i);

        match &block.kind {
            BlockKind::Title | BlockKind::Heading { .. } => {
                let depth = match &block.kind {
                    BlockKind::Heading { depth } => *depth,
                    _ => 1,
                };
                while stack.last().is_some_and(|&(_, d)| d >= depth) {
                    stack.pop();
                }
                let parent = stack.last().map(|&(idx, _)| idx).unwrap_or(root);
                let section = tree.push_child(
                    parent,
                    NodeKind::Section,
                    String::new(),
                    Some(block.text.clone()),
                    Some(depth),
                    block.page_number,
                );
                stack.push((section, depth));
            }
            BlockKind::Paragraph => {
                let parent = stack.last().map(|&(idx, _)| idx).unwrap_or(root);
                tree.push_child(
                    parent,
                    NodeKind::Paragraph,
                    block.text.clone(),
                    None,
                    None,
                    block.page_number,
                );
            }
            BlockKind::Table { rows } => {
                let parent = stack.last().map(|&(idx, _)| idx).unwrap_or(root);
                tree.push_child(
                    parent,
                    NodeKind::Table,
                    render_table_rows(rows),
                    None,
                    None,
                    block.page_number,
                );
            }
        }
    }

    // Trailing images past the last block.
    place_images(&mut tree, &stack, extracted.blocks.len());

    info!(
        nodes = tree.len(),
        sections = tree.root_sections().len(),
        "document tree built"
    );
    debug!(title = %tree.title, "tree root");
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_base::ExtractedBlock;

    fn heading(depth: usize, text: &str) -> ExtractedBlock {
        ExtractedBlock {
            kind: BlockKind::Heading { depth },
            text: text.into(),
            page_number: Some(1),
        }
    }

    fn para(text: &str) -> ExtractedBlock {
        ExtractedBlock {
            kind: BlockKind::Paragraph,
            text: text.into(),
            page_number: Some(1),
        }
    }

    #[test]
    fn headings_nest_and_pop_by_depth() {
        let extracted = ExtractedDocument {
            blocks: vec![
                heading(2, "Alpha"),
                para("a-body"),
                heading(3, "Alpha.Inner"),
                para("inner-body"),
                heading(2, "Beta"),
                para("b-body"),
            ],
            image_regions: Vec::new(),
        };
        let tree = build("doc", "text/markdown", &extracted, &HashMap::new());

        // Two top-level sections: Alpha and Beta.
        let roots = tree.root_sections();
        assert_eq!(roots.len(), 2);
        assert_eq!(tree.node(roots[0]).title.as_deref(), Some("Alpha"));
        assert_eq!(tree.node(roots[1]).title.as_deref(), Some("Beta"));

        // inner-body carries the full ancestor path.
        let leaves = tree.leaves();
        let inner = leaves
            .iter()
            .find(|&&i| tree.node(i).content == "inner-body")
            .copied()
            .unwrap();
        assert_eq!(
            tree.node(inner).hierarchy_path,
            vec!["Alpha".to_string(), "Alpha.Inner".to_string()]
        );
        let b = leaves
            .iter()
            .find(|&&i| tree.node(i).content == "b-body")
            .copied()
            .unwrap();
        assert_eq!(tree.node(b).hierarchy_path, vec!["Beta".to_string()]);
    }

    #[test]
    fn paragraphs_before_any_heading_attach_to_root() {
        let extracted = ExtractedDocument {
            blocks: vec![para("preamble"), heading(2, "S"), para("body")],
            image_regions: Vec::new(),
        };
        let tree = build("doc", "text/plain", &extracted, &HashMap::new());
        let leaves = tree.leaves();
        assert!(tree.node(leaves[0]).hierarchy_path.is_empty());
        assert_eq!(tree.node(leaves[1]).hierarchy_path, vec!["S".to_string()]);
    }

    #[test]
    fn image_descriptions_land_in_reading_order() {
        let extracted = ExtractedDocument {
            blocks: vec![heading(2, "S"), para("body")],
            image_regions: vec![doc_base::ImageRegion {
                reading_order: 2,
                page_number: Some(3),
                bytes: Vec::new(),
            }],
        };
        let captions = HashMap::from([(2usize, "a bar chart of revenue".to_string())]);
        let tree = build("doc", "application/pdf", &extracted, &captions);

        let leaves = tree.leaves();
        let img = leaves
            .iter()
            .find(|&&i| tree.node(i).kind == NodeKind::ImageDescription)
            .copied()
            .unwrap();
        assert_eq!(tree.node(img).content, "a bar chart of revenue");
        assert_eq!(tree.node(img).page_number, Some(3));
        assert_eq!(tree.node(img).hierarchy_path, vec!["S".to_string()]);
    }

    #[test]
    fn tables_serialize_as_positional_rows() {
        let extracted = ExtractedDocument {
            blocks: vec![ExtractedBlock {
                kind: BlockKind::Table {
                    rows: vec![
                        vec!["h1".into(), "h2".into()],
                        vec!["a".into(), "b".into()],
                    ],
                },
                text: String::new(),
                page_number: Some(1),
            }],
            image_regions: Vec::new(),
        };
        let tree = build("doc", "application/pdf", &extracted, &HashMap::new());
        let leaves = tree.leaves();
        assert_eq!(tree.node(leaves[0]).content, "| h1 | h2 |\n| a | b |");
    }
}
