//! Arena-backed document tree.
//!
//! The tree is written once by the tree builder and walked in order by the
//! summarizer and chunker. Nodes live in a flat vector with parent/children
//! indexes; there is no pointer-rich structure to serialize or to own
//! cyclically.

use serde::{Deserialize, Serialize};

/// Node kinds appearing in a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Section,
    Heading,
    Paragraph,
    Table,
    ImageDescription,
}

/// A single node in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Textual content. Empty for container nodes (document, section).
    /// Tables carry their rows pre-serialized as pipe-delimited lines.
    pub content: String,
    /// Heading title for sections; `None` otherwise.
    pub title: Option<String>,
    /// Heading level as extracted (1 for a document title, 2+ for headings).
    pub level: Option<usize>,
    /// Ordered ancestor section titles, root-first.
    pub hierarchy_path: Vec<String>,
    pub page_number: Option<u32>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl TreeNode {
    /// Depth equals the hierarchy path length by construction.
    pub fn depth(&self) -> usize {
        self.hierarchy_path.len()
    }
}

/// Rooted ordered tree over a node arena. Index 0 is always the root
/// `document` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTree {
    /// Document title (the filename, unless a title-role block overrides it).
    pub title: String,
    /// MIME type of the source document.
    pub doc_type: String,
    nodes: Vec<TreeNode>,
}

impl DocumentTree {
    /// Creates a tree with a bare root node.
    pub fn new(title: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let root = TreeNode {
            kind: NodeKind::Document,
            content: String::new(),
            title: None,
            level: None,
            hierarchy_path: Vec::new(),
            page_number: None,
            parent: None,
            children: Vec::new(),
        };
        Self {
            title: title.into(),
            doc_type: doc_type.into(),
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists; an "empty" tree has no content nodes.
        self.nodes.len() == 1
    }

    /// Appends a node under `parent`, computing its hierarchy path from the
    /// parent: the parent's own path, extended by the parent's title when the
    /// parent is a section.
    pub fn push_child(
        &mut self,
        parent: usize,
        kind: NodeKind,
        content: String,
        title: Option<String>,
        level: Option<usize>,
        page_number: Option<u32>,
    ) -> usize {
        let path = {
            let p = &self.nodes[parent];
            let mut path = p.hierarchy_path.clone();
            if p.kind == NodeKind::Section {
                if let Some(t) = &p.title {
                    path.push(t.clone());
                }
            }
            path
        };
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            kind,
            content,
            title,
            level,
            hierarchy_path: path,
            page_number,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    /// Indexes of content leaves (paragraph, table, image description) in
    /// document order.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.walk(self.root(), &mut |idx, node| {
            if matches!(
                node.kind,
                NodeKind::Paragraph | NodeKind::Table | NodeKind::ImageDescription
            ) {
                out.push(idx);
            }
        });
        out
    }

    /// Direct child sections of the root, in document order.
    pub fn root_sections(&self) -> Vec<usize> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .filter(|&i| self.nodes[i].kind == NodeKind::Section)
            .collect()
    }

    /// Full textual rendering in document order: headings prefixed with `#`
    /// markers, tables as pipe rows, image descriptions bracketed.
    pub fn full_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        self.walk(self.root(), &mut |_, node| match node.kind {
            NodeKind::Section | NodeKind::Heading => {
                if let Some(t) = &node.title {
                    if !t.is_empty() {
                        let prefix = "#".repeat(node.depth().saturating_add(1).min(4));
                        lines.push(format!("\n{prefix} {t}\n"));
                    }
                }
            }
            NodeKind::Paragraph | NodeKind::Table => {
                if !node.content.is_empty() {
                    lines.push(node.content.clone());
                }
            }
            NodeKind::ImageDescription => {
                if !node.content.is_empty() {
                    lines.push(format!("\n[Image: {}]\n", node.content));
                }
            }
            NodeKind::Document => {}
        });
        lines.join("\n")
    }

    /// Aggregated text of a subtree (paragraphs, tables, image descriptions).
    pub fn node_text(&self, idx: usize) -> String {
        let mut lines: Vec<String> = Vec::new();
        self.walk(idx, &mut |_, node| match node.kind {
            NodeKind::Paragraph | NodeKind::Table => {
                if !node.content.is_empty() {
                    lines.push(node.content.clone());
                }
            }
            NodeKind::ImageDescription => {
                if !node.content.is_empty() {
                    lines.push(format!("[Image: {}]", node.content));
                }
            }
            _ => {}
        });
        lines.join("\n")
    }

    fn walk(&self, idx: usize, f: &mut impl FnMut(usize, &TreeNode)) {
        f(idx, &self.nodes[idx]);
        // Children vectors are append-only, so the clone stays cheap and the
        // borrow does not outlive the visit.
        let children = self.nodes[idx].children.clone();
        for c in children {
            self.walk(c, f);
        }
    }
}

/// Serializes table rows as pipe-delimited positional lines.
pub fn render_table_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|r| format!("| {} |", r.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n")
}
