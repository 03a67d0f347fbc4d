//! Parsed-tree model attached to stable blocks, and the parser seam that produces it.

use crate::types::Alignment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Paragraph,
    Heading { level: u8 },
    BlockQuote,
    CodeBlock { language: Option<String>, code: String },
    List { ordered: bool, start: Option<u64> },
    ListItem { checked: Option<bool> },
    Table { alignments: Vec<Alignment> },
    TableHead,
    TableRow,
    TableCell,
    ThematicBreak,
    Html(String),
    FootnoteDefinition { label: String },
    FootnoteReference { label: String },
    Emphasis,
    Strong,
    Strikethrough,
    Link { url: String, title: String },
    Image { url: String, title: String },
    Code(String),
    Text(String),
    SoftBreak,
    HardBreak,
    /// A `<!--component:Name@offset-->` marker left by component extraction.
    Component { id: String },
    /// Container for constructs without a dedicated kind.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(s.into()))
    }

    /// Concatenated text of this subtree (code included, markup dropped).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text(s) | NodeKind::Code(s) => out.push_str(s),
            NodeKind::CodeBlock { code, .. } => out.push_str(code),
            NodeKind::SoftBreak | NodeKind::HardBreak => out.push('\n'),
            _ => {}
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub fn find(&self, pred: impl Fn(&Node) -> bool) -> Option<&Node> {
        let mut found = None;
        self.walk(&mut |n| {
            if found.is_none() && pred(n) {
                found = Some(n);
            }
        });
        found
    }
}

/// The tree used when a backend cannot produce one: a paragraph holding the raw text.
pub fn fallback_tree(content: &str) -> Node {
    Node::with_children(
        NodeKind::Document,
        vec![Node::with_children(
            NodeKind::Paragraph,
            vec![Node::text(content)],
        )],
    )
}

/// Component marker id, if `html` is exactly one marker.
pub(crate) fn component_marker_id(html: &str) -> Option<&str> {
    html.trim()
        .strip_prefix("<!--component:")?
        .strip_suffix("-->")
        .filter(|id| !id.is_empty() && !id.contains("--"))
}

/// Markdown backend used to build the cached tree of stable blocks.
///
/// Implementations must be deterministic. Failures are reported by [`try_parse_document`]
/// returning `None`; the provided methods then fall back to [`fallback_tree`].
///
/// [`try_parse_document`]: BlockParser::try_parse_document
pub trait BlockParser {
    fn try_parse_document(&self, content: &str) -> Option<Node>;

    fn parse_document(&self, content: &str) -> Node {
        self.try_parse_document(content)
            .unwrap_or_else(|| fallback_tree(content))
    }

    /// Tree for one block: its single top-level node, the whole document when the content held
    /// several, or `None` when it held nothing.
    fn parse_block(&self, content: &str) -> Option<Node> {
        let mut doc = self.parse_document(content);
        match doc.children.len() {
            0 => None,
            1 => doc.children.pop(),
            _ => Some(doc),
        }
    }

    fn is_valid_markdown(&self, content: &str) -> bool {
        self.try_parse_document(content).is_some()
    }
}

/// Backend without Markdown semantics: blank-line separated paragraphs of raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl BlockParser for PlainTextParser {
    fn try_parse_document(&self, content: &str) -> Option<Node> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n"));
        }
        let children = paragraphs
            .into_iter()
            .map(|p| Node::with_children(NodeKind::Paragraph, vec![Node::text(p)]))
            .collect();
        Some(Node::with_children(NodeKind::Document, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_on_blank_lines() {
        let doc = PlainTextParser.parse_document("a\nb\n\n\nc\n");
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[0].text_content(), "a\nb");
        assert_eq!(doc.children[1].text_content(), "c");
    }

    #[test]
    fn parse_block_unwraps_single_child() {
        let node = PlainTextParser.parse_block("just text\n");
        assert_eq!(node.map(|n| n.kind), Some(NodeKind::Paragraph));
        assert_eq!(PlainTextParser.parse_block("  \n"), None);
    }

    #[test]
    fn marker_ids() {
        assert_eq!(component_marker_id("<!--component:Card@3-->\n"), Some("Card@3"));
        assert_eq!(component_marker_id("<!-- note -->"), None);
    }
}
