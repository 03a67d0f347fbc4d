use std::panic::{AssertUnwindSafe, catch_unwind};

use pulldown_cmark::{
    Alignment as PulldownAlignment, CodeBlockKind, Event, Options as PulldownOptions, Parser, Tag,
};
use tracing::warn;

use crate::ast::{BlockParser, Node, NodeKind, component_marker_id};
use crate::types::Alignment;

#[derive(Debug, Clone)]
pub struct PulldownParserOptions {
    pub pulldown: PulldownOptions,
    /// Turn bare `http://`, `https://` and `www.` URLs in text into links.
    pub autolinks: bool,
}

impl Default for PulldownParserOptions {
    fn default() -> Self {
        Self {
            pulldown: PulldownOptions::ENABLE_TABLES
                | PulldownOptions::ENABLE_STRIKETHROUGH
                | PulldownOptions::ENABLE_TASKLISTS
                | PulldownOptions::ENABLE_FOOTNOTES,
            autolinks: true,
        }
    }
}

/// CommonMark + GFM [`BlockParser`] backed by `pulldown-cmark`.
#[derive(Debug, Clone, Default)]
pub struct PulldownParser {
    opts: PulldownParserOptions,
}

impl PulldownParser {
    pub fn new(opts: PulldownParserOptions) -> Self {
        Self { opts }
    }
}

impl BlockParser for PulldownParser {
    fn try_parse_document(&self, content: &str) -> Option<Node> {
        let opts = &self.opts;
        match catch_unwind(AssertUnwindSafe(|| build_tree(content, opts))) {
            Ok(doc) => Some(doc),
            Err(_) => {
                warn!(len = content.len(), "markdown backend panicked; using plain-text fallback");
                None
            }
        }
    }
}

fn map_alignment(a: &PulldownAlignment) -> Alignment {
    match a {
        PulldownAlignment::None => Alignment::None,
        PulldownAlignment::Left => Alignment::Left,
        PulldownAlignment::Center => Alignment::Center,
        PulldownAlignment::Right => Alignment::Right,
    }
}

fn node_kind(tag: Tag<'_>) -> NodeKind {
    match tag {
        Tag::Paragraph => NodeKind::Paragraph,
        Tag::Heading { level, .. } => NodeKind::Heading { level: level as u8 },
        Tag::BlockQuote(_) => NodeKind::BlockQuote,
        Tag::CodeBlock(kind) => NodeKind::CodeBlock {
            language: match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(str::to_string),
                CodeBlockKind::Indented => None,
            },
            code: String::new(),
        },
        Tag::HtmlBlock => NodeKind::Html(String::new()),
        Tag::List(start) => NodeKind::List {
            ordered: start.is_some(),
            start,
        },
        Tag::Item => NodeKind::ListItem { checked: None },
        Tag::FootnoteDefinition(label) => NodeKind::FootnoteDefinition {
            label: label.to_string(),
        },
        Tag::Table(alignments) => NodeKind::Table {
            alignments: alignments.iter().map(map_alignment).collect(),
        },
        Tag::TableHead => NodeKind::TableHead,
        Tag::TableRow => NodeKind::TableRow,
        Tag::TableCell => NodeKind::TableCell,
        Tag::Emphasis => NodeKind::Emphasis,
        Tag::Strong => NodeKind::Strong,
        Tag::Strikethrough => NodeKind::Strikethrough,
        Tag::Link {
            dest_url, title, ..
        } => NodeKind::Link {
            url: dest_url.to_string(),
            title: title.to_string(),
        },
        Tag::Image {
            dest_url, title, ..
        } => NodeKind::Image {
            url: dest_url.to_string(),
            title: title.to_string(),
        },
        _ => NodeKind::Group,
    }
}

fn build_tree(content: &str, opts: &PulldownParserOptions) -> Node {
    let mut stack = vec![Node::new(NodeKind::Document)];

    for event in Parser::new_ext(content, opts.pulldown) {
        match event {
            Event::Start(tag) => stack.push(Node::new(node_kind(tag))),
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(mut node) = stack.pop() {
                        if let NodeKind::Html(html) = &node.kind {
                            if let Some(id) = component_marker_id(html) {
                                node.kind = NodeKind::Component { id: id.to_string() };
                            }
                        }
                        push_child(&mut stack, node);
                    }
                }
            }
            Event::Text(text) => {
                let Some(top) = stack.last_mut() else {
                    continue;
                };
                match &mut top.kind {
                    NodeKind::CodeBlock { code, .. } => code.push_str(&text),
                    NodeKind::Html(html) => html.push_str(&text),
                    _ => append_text(top, &text),
                }
            }
            Event::Code(code) => push_child(&mut stack, Node::new(NodeKind::Code(code.to_string()))),
            Event::Html(html) => match stack.last_mut().map(|n| &mut n.kind) {
                Some(NodeKind::Html(buf)) => buf.push_str(&html),
                _ => push_child(&mut stack, Node::new(NodeKind::Html(html.to_string()))),
            },
            Event::InlineHtml(html) => {
                let node = match component_marker_id(&html) {
                    Some(id) => Node::new(NodeKind::Component { id: id.to_string() }),
                    None => Node::new(NodeKind::Html(html.to_string())),
                };
                push_child(&mut stack, node);
            }
            Event::FootnoteReference(label) => push_child(
                &mut stack,
                Node::new(NodeKind::FootnoteReference {
                    label: label.to_string(),
                }),
            ),
            Event::SoftBreak => push_child(&mut stack, Node::new(NodeKind::SoftBreak)),
            Event::HardBreak => push_child(&mut stack, Node::new(NodeKind::HardBreak)),
            Event::Rule => push_child(&mut stack, Node::new(NodeKind::ThematicBreak)),
            Event::TaskListMarker(checked) => {
                if let Some(NodeKind::ListItem { checked: slot }) =
                    stack.last_mut().map(|n| &mut n.kind)
                {
                    *slot = Some(checked);
                }
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                push_child(&mut stack, Node::new(NodeKind::Code(math.to_string())))
            }
        }
    }

    // Unbalanced events never reach here from pulldown-cmark, but fold any leftovers anyway.
    while stack.len() > 1 {
        if let Some(node) = stack.pop() {
            push_child(&mut stack, node);
        }
    }
    let mut doc = stack.pop().unwrap_or_else(|| Node::new(NodeKind::Document));
    if opts.autolinks {
        link_bare_urls(&mut doc);
    }
    doc
}

fn push_child(stack: &mut [Node], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Adjacent text events are merged so URLs split across events are still recognized.
fn append_text(parent: &mut Node, text: &str) {
    if let Some(Node {
        kind: NodeKind::Text(prev),
        ..
    }) = parent.children.last_mut()
    {
        prev.push_str(text);
    } else {
        parent.children.push(Node::text(text));
    }
}

fn link_bare_urls(node: &mut Node) {
    if matches!(
        node.kind,
        NodeKind::Link { .. } | NodeKind::Image { .. } | NodeKind::CodeBlock { .. }
    ) {
        return;
    }
    let children = std::mem::take(&mut node.children);
    for mut child in children {
        match &child.kind {
            NodeKind::Text(text) => split_autolinks(text, &mut node.children),
            _ => {
                link_bare_urls(&mut child);
                node.children.push(child);
            }
        }
    }
}

fn split_autolinks(text: &str, out: &mut Vec<Node>) {
    let mut rest = text;
    loop {
        let Some((start, end, url)) = find_bare_url(rest) else {
            if !rest.is_empty() {
                out.push(Node::text(rest));
            }
            return;
        };
        if start > 0 {
            out.push(Node::text(&rest[..start]));
        }
        out.push(Node::with_children(
            NodeKind::Link {
                url,
                title: String::new(),
            },
            vec![Node::text(&rest[start..end])],
        ));
        rest = &rest[end..];
    }
}

/// First bare URL in `text`: its byte range and the link destination.
fn find_bare_url(text: &str) -> Option<(usize, usize, String)> {
    let mut search = 0usize;
    while search < text.len() {
        let hay = &text[search..];
        let rel = ["https://", "http://", "www."]
            .iter()
            .filter_map(|p| hay.find(p))
            .min()?;
        let start = search + rel;
        let at_boundary = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || matches!(c, '(' | '*' | '_' | '~' | '"' | '\''));
        let raw_end = text[start..]
            .find(|c: char| c.is_whitespace() || c == '<')
            .map_or(text.len(), |r| start + r);
        let end = start + trim_url_tail(&text[start..raw_end]).len();
        let candidate = &text[start..end];
        let scheme_len = if candidate.starts_with("https://") {
            8
        } else if candidate.starts_with("http://") {
            7
        } else {
            4
        };
        let host = &candidate[scheme_len..];
        if at_boundary && host.contains(|c: char| c.is_alphanumeric()) && (scheme_len != 4 || host.contains('.')) {
            let url = if scheme_len == 4 {
                format!("http://{candidate}")
            } else {
                candidate.to_string()
            };
            return Some((start, end, url));
        }
        search = start + 1;
        while !text.is_char_boundary(search) {
            search += 1;
        }
    }
    None
}

fn trim_url_tail(url: &str) -> &str {
    let mut s = url;
    loop {
        let Some(last) = s.chars().next_back() else {
            return s;
        };
        let trim = match last {
            '.' | ',' | ':' | ';' | '!' | '?' | '"' | '\'' | '*' | '_' | '~' => true,
            ')' => s.matches('(').count() < s.matches(')').count(),
            _ => false,
        };
        if !trim {
            return s;
        }
        s = &s[..s.len() - last.len_utf8()];
    }
}
