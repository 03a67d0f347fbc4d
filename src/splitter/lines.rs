use crate::syntax::{
    heading_level, is_blockquote_start, is_directive_start, is_list_continuation,
    is_list_item_start, is_thematic_break, list_marker, parse_code_fence_header,
};
use crate::types::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockMode {
    /// No complete line seen yet.
    Unknown,
    Paragraph,
    Heading {
        level: u8,
    },
    HorizontalRule,
    CodeFence {
        fence_char: char,
        fence_len: usize,
    },
    /// `start` is the absolute offset of the directive's `[{`.
    Component {
        start: usize,
    },
    List,
    Blockquote,
    Table,
}

impl BlockMode {
    pub(crate) fn kind(self) -> BlockKind {
        match self {
            BlockMode::Unknown | BlockMode::Paragraph => BlockKind::Paragraph,
            BlockMode::Heading { .. } => BlockKind::Heading,
            BlockMode::HorizontalRule => BlockKind::HorizontalRule,
            BlockMode::CodeFence { .. } => BlockKind::CodeBlock,
            BlockMode::Component { .. } => BlockKind::Component,
            BlockMode::List => BlockKind::List,
            BlockMode::Blockquote => BlockKind::Blockquote,
            BlockMode::Table => BlockKind::Table,
        }
    }
}

/// Mode for the first line of a block. Tables start as paragraphs and are upgraded when the
/// delimiter row arrives.
pub(crate) fn start_mode(line: &str, line_start: usize, components: bool) -> BlockMode {
    if let Some(header) = parse_code_fence_header(line) {
        return BlockMode::CodeFence {
            fence_char: header.fence_char,
            fence_len: header.fence_len,
        };
    }
    if let Some(level) = heading_level(line) {
        return BlockMode::Heading { level };
    }
    if components && is_directive_start(line) {
        let indent = line.len() - line.trim_start().len();
        return BlockMode::Component {
            start: line_start + indent,
        };
    }
    if is_thematic_break(line) {
        return BlockMode::HorizontalRule;
    }
    if is_blockquote_start(line) {
        return BlockMode::Blockquote;
    }
    if is_list_item_start(line) {
        return BlockMode::List;
    }
    BlockMode::Paragraph
}

/// Only bullets and lists starting at 1 may interrupt a paragraph, and never with an empty item.
fn list_interrupts_paragraph(line: &str) -> bool {
    list_marker(line).is_some_and(|m| {
        (!m.ordered || m.start == Some(1))
            && line.get(m.content_offset..).is_some_and(|rest| !rest.trim().is_empty())
    })
}

/// Whether `line` starts a new block while `mode` is open (blank lines are handled separately).
pub(crate) fn interrupts(mode: BlockMode, line: &str, components: bool) -> bool {
    let starts_block = heading_level(line).is_some()
        || parse_code_fence_header(line).is_some()
        || is_thematic_break(line)
        || (components && is_directive_start(line));
    match mode {
        BlockMode::List => {
            is_thematic_break(line)
                || (!is_list_continuation(line) && (starts_block || is_blockquote_start(line)))
        }
        BlockMode::Blockquote => {
            !is_blockquote_start(line) && (starts_block || is_list_item_start(line))
        }
        BlockMode::Paragraph | BlockMode::Table => {
            starts_block || is_blockquote_start(line) || list_interrupts_paragraph(line)
        }
        _ => false,
    }
}
