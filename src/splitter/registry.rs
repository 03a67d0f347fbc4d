use std::sync::Arc;

use crate::ast::{BlockParser, Node};
use crate::component::{ComponentInstance, JsonCleanupReport};
use crate::tags::TagState;
use crate::types::{BlockId, BlockKind, StableBlock};

use super::lines::BlockMode;

/// The provisional block at the end of the stream. Rebuilt on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBlock {
    pub(crate) kind: BlockKind,
    pub(crate) content: String,
    pub(crate) start_pos: usize,
    pub(crate) tag_state: TagState,
    pub(crate) display: String,
    pub(crate) components: Vec<ComponentInstance>,
    pub(crate) last_cleanup: Option<JsonCleanupReport>,

    pub(crate) mode: BlockMode,
    /// Absolute offset of the first line not yet examined.
    pub(crate) scanned: usize,
    /// Absolute range of the previous complete line, newline excluded.
    pub(crate) prev_line: Option<(usize, usize)>,
    /// Complete lines examined so far.
    pub(crate) lines: usize,
}

impl ActiveBlock {
    pub(crate) fn new(start_pos: usize) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            content: String::new(),
            start_pos,
            tag_state: TagState::new(),
            display: String::new(),
            components: Vec::new(),
            last_cleanup: None,
            mode: BlockMode::Unknown,
            scanned: start_pos,
            prev_line: None,
            lines: 0,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Raw source received so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn tag_state(&self) -> &TagState {
        &self.tag_state
    }

    /// Content with directives replaced by markers and dangling markup closed or hidden.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn components(&self) -> &[ComponentInstance] {
        &self.components
    }

    pub fn last_cleanup(&self) -> Option<&JsonCleanupReport> {
        self.last_cleanup.as_ref()
    }

    /// Parse the display text. Never cached: the active block changes on every call.
    pub fn parse_display(&self, parser: &dyn BlockParser) -> Option<Node> {
        parser.parse_block(&self.display)
    }
}

/// Immutable snapshot of a stream: stable blocks plus the provisional tail.
///
/// Snapshots share their stable blocks; producing the next snapshot never copies block content.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    pub(crate) blocks: Arc<Vec<Arc<StableBlock>>>,
    pub(crate) active: Option<ActiveBlock>,
    pub(crate) cursor: usize,
    pub(crate) block_counter: u64,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Arc<StableBlock>] {
        &self.blocks
    }

    /// The provisional block, unless it holds nothing but whitespace.
    pub fn active_block(&self) -> Option<&ActiveBlock> {
        self.active
            .as_ref()
            .filter(|a| !a.content.trim().is_empty())
    }

    pub fn active_tag_state(&self) -> Option<&TagState> {
        self.active.as_ref().map(|a| &a.tag_state)
    }

    /// Bytes of the full text consumed so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn block_counter(&self) -> u64 {
        self.block_counter
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.active_block().is_none()
    }

    /// Blocks added since `prev`, an earlier snapshot of the same stream.
    ///
    /// After a rollback the shared prefix is shorter than `prev`; everything past it is returned.
    pub fn blocks_since(&self, prev: &BlockRegistry) -> &[Arc<StableBlock>] {
        let shared = self
            .blocks
            .iter()
            .zip(prev.blocks.iter())
            .take_while(|(a, b)| Arc::ptr_eq(a, b) || a.id == b.id)
            .count();
        &self.blocks[shared..]
    }

    pub(crate) fn next_id(&mut self) -> BlockId {
        let id = BlockId(self.block_counter);
        self.block_counter += 1;
        id
    }

    pub(crate) fn push(&mut self, block: StableBlock) {
        Arc::make_mut(&mut self.blocks).push(Arc::new(block));
    }

    /// Drop every stable block that does not fit in `text` and resume from the last one kept.
    pub(crate) fn roll_back_to(&mut self, text: &str) {
        let keep = self
            .blocks
            .iter()
            .take_while(|b| b.end_pos() <= text.len() && text.is_char_boundary(b.end_pos()))
            .count();
        if keep < self.blocks.len() {
            Arc::make_mut(&mut self.blocks).truncate(keep);
        }
        self.cursor = self.blocks.last().map_or(0, |b| b.end_pos());
        self.active = None;
    }
}
