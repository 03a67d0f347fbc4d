//! Streaming block splitter.
//!
//! [`Splitter::process_new_content`] is called with the full text received so far. Only the
//! suffix past the registry cursor is examined; boundaries are decided on complete lines (plus a
//! few line starts that cannot change meaning as more characters arrive), so any chunking of the
//! same text yields the same stable blocks.

mod lines;
mod meta;
mod registry;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{BlockParser, PlainTextParser};
use crate::component::{ComponentRegistry, directive_end, extract_components};
use crate::options::{Options, TruncationPolicy};
use crate::pending::fix_incomplete_markdown_with;
use crate::syntax::{
    could_be_directive_start, heading_prefix_level, is_code_fence_closing_line, is_directive_start,
    is_empty_line, is_table_delimiter, lone_image, setext_underline_char,
};
use crate::tags::TagState;
use crate::types::{BlockId, BlockKind, BlockMeta, ContentHash, StableBlock};

use lines::{BlockMode, interrupts, start_mode};

pub use registry::{ActiveBlock, BlockRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStep {
    Continue,
    /// Commit the active block up to this absolute offset; the rest starts a new block.
    CommitAt(usize),
    /// Drop the active content up to this offset without emitting a block.
    Discard(usize),
}

pub struct Splitter {
    opts: Options,
    parser: Arc<dyn BlockParser + Send + Sync>,
    components: Option<Arc<dyn ComponentRegistry + Send + Sync>>,
}

impl fmt::Debug for Splitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("opts", &self.opts)
            .field("components", &self.components.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

#[cfg(feature = "pulldown")]
fn default_parser() -> Arc<dyn BlockParser + Send + Sync> {
    Arc::new(crate::adapters::pulldown::PulldownParser::default())
}

#[cfg(not(feature = "pulldown"))]
fn default_parser() -> Arc<dyn BlockParser + Send + Sync> {
    Arc::new(PlainTextParser)
}

impl Splitter {
    pub fn new(opts: Options) -> Self {
        Self {
            opts,
            parser: default_parser(),
            components: None,
        }
    }

    /// Splitter that attaches plain-text trees instead of parsed Markdown.
    pub fn plain_text(opts: Options) -> Self {
        Self::new(opts).with_parser(PlainTextParser)
    }

    pub fn with_parser<P>(mut self, parser: P) -> Self
    where
        P: BlockParser + Send + Sync + 'static,
    {
        self.parser = Arc::new(parser);
        self
    }

    pub fn with_components<R>(mut self, registry: R) -> Self
    where
        R: ComponentRegistry + Send + Sync + 'static,
    {
        self.components = Some(Arc::new(registry));
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn parser(&self) -> &dyn BlockParser {
        self.parser.as_ref()
    }

    fn component_registry(&self) -> Option<&dyn ComponentRegistry> {
        self.components
            .as_deref()
            .map(|r| r as &dyn ComponentRegistry)
    }

    pub fn reset_registry(&self) -> BlockRegistry {
        BlockRegistry::new()
    }

    /// Split `full_text`, the entire text received so far, starting where `registry` left off.
    pub fn process_new_content(&self, registry: &BlockRegistry, full_text: &str) -> BlockRegistry {
        let mut reg = registry.clone();

        if full_text.len() < reg.cursor || !full_text.is_char_boundary(reg.cursor) {
            match self.opts.truncation {
                TruncationPolicy::Ignore => {
                    trace!(
                        cursor = reg.cursor,
                        len = full_text.len(),
                        "text shorter than cursor; ignored"
                    );
                    return reg;
                }
                TruncationPolicy::Rollback => {
                    reg.roll_back_to(full_text);
                    debug!(
                        cursor = reg.cursor,
                        kept = reg.blocks.len(),
                        "rolled back after truncation"
                    );
                }
            }
        }
        if full_text.len() == reg.cursor {
            return reg;
        }

        trace!(
            cursor = reg.cursor,
            appended = full_text.len() - reg.cursor,
            "process_new_content"
        );
        let resume = reg.cursor;
        reg.cursor = full_text.len();
        let base = reg
            .active
            .get_or_insert_with(|| ActiveBlock::new(resume))
            .start_pos;

        let region = &full_text[base..];
        self.split_lines(&mut reg, region, base, false);
        self.refresh_active(&mut reg, region, base);
        reg
    }

    /// End of stream: commit whatever the active block holds.
    pub fn finalize_active_block(&self, registry: &BlockRegistry) -> BlockRegistry {
        let mut reg = registry.clone();
        let Some(active) = reg.active.as_ref() else {
            return reg;
        };
        let region = active.content.clone();
        let base = active.start_pos;

        self.split_lines(&mut reg, &region, base, true);
        self.commit(&mut reg, &region, base, base + region.len());
        reg.active = None;
        reg
    }

    /// Process `text` as a complete document.
    pub fn split_all(&self, text: &str) -> BlockRegistry {
        let reg = self.process_new_content(&BlockRegistry::new(), text);
        self.finalize_active_block(&reg)
    }

    /// `region` is the text from the active block's start (absolute offset `base`) to the end of
    /// what has been received.
    fn split_lines(&self, reg: &mut BlockRegistry, region: &str, base: usize, at_eof: bool) {
        loop {
            let Some(active) = reg.active.as_mut() else {
                return;
            };
            let from = active.scanned - base;
            let (line_end, next) = match region[from..].find('\n') {
                Some(rel) => (from + rel, from + rel + 1),
                None if at_eof && from < region.len() => (region.len(), region.len()),
                None => break,
            };
            let line = &region[from..line_end];
            let prev = active.prev_line.map(|(s, e)| &region[s - base..e - base]);

            let step = self.step_line(active, region, base, line, prev, base + from, base + next);
            active.scanned = base + next;
            active.prev_line = Some((base + from, base + line_end));
            active.lines += 1;

            match step {
                LineStep::Continue => {}
                LineStep::CommitAt(at) => self.commit(reg, region, base, at),
                LineStep::Discard(at) => reg.active = Some(ActiveBlock::new(at)),
            }
        }

        if !at_eof {
            self.split_incomplete_tail(reg, region, base);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_line(
        &self,
        active: &mut ActiveBlock,
        region: &str,
        base: usize,
        line: &str,
        prev: Option<&str>,
        line_start: usize,
        next: usize,
    ) -> LineStep {
        let components = self.opts.components;
        match active.mode {
            BlockMode::Unknown => {
                if is_empty_line(line) {
                    return LineStep::Discard(next);
                }
                active.mode = start_mode(line, line_start, components);
                match active.mode {
                    BlockMode::Heading { .. } | BlockMode::HorizontalRule => LineStep::CommitAt(next),
                    BlockMode::Component { start } => directive_step(region, base, start, next),
                    _ => LineStep::Continue,
                }
            }
            BlockMode::CodeFence {
                fence_char,
                fence_len,
            } => {
                if is_code_fence_closing_line(line, fence_char, fence_len) {
                    LineStep::CommitAt(next)
                } else {
                    LineStep::Continue
                }
            }
            BlockMode::Component { start } => directive_step(region, base, start, next),
            BlockMode::Heading { .. } | BlockMode::HorizontalRule => LineStep::CommitAt(line_start),
            BlockMode::Paragraph | BlockMode::List | BlockMode::Blockquote | BlockMode::Table => {
                if is_empty_line(line) {
                    return LineStep::CommitAt(next);
                }
                if active.mode == BlockMode::Paragraph && active.lines == 1 && self.opts.setext_headings {
                    if let Some(c) = setext_underline_char(line) {
                        active.mode = BlockMode::Heading {
                            level: if c == '=' { 1 } else { 2 },
                        };
                        return LineStep::CommitAt(next);
                    }
                }
                if active.mode == BlockMode::Paragraph
                    && is_table_delimiter(line)
                    && prev.is_some_and(|p| p.contains('|'))
                {
                    if active.lines == 1 {
                        active.mode = BlockMode::Table;
                        return LineStep::Continue;
                    }
                    // The header row starts the table; earlier lines stay a paragraph.
                    if let Some((prev_start, _)) = active.prev_line {
                        return LineStep::CommitAt(prev_start);
                    }
                }
                if interrupts(active.mode, line, components) {
                    return LineStep::CommitAt(line_start);
                }
                LineStep::Continue
            }
        }
    }

    /// A partial last line may already start a new block when its prefix can no longer change
    /// meaning (an ATX heading marker followed by whitespace, a directive opener).
    fn split_incomplete_tail(&self, reg: &mut BlockRegistry, region: &str, base: usize) {
        let Some(active) = reg.active.as_ref() else {
            return;
        };
        if active.lines == 0 {
            return;
        }
        let from = active.scanned - base;
        let partial = &region[from..];
        if partial.is_empty() {
            return;
        }
        let stable_start = heading_prefix_level(partial).is_some()
            || (self.opts.components && is_directive_start(partial));
        if stable_start && interrupts(active.mode, partial, self.opts.components) {
            self.commit(reg, region, base, base + from);
        }
    }

    /// Emit `[active.start_pos, at)` as a stable block (unless blank) and start a new active
    /// block at `at`.
    fn commit(&self, reg: &mut BlockRegistry, region: &str, base: usize, at: usize) {
        let Some(active) = reg.active.take() else {
            return;
        };
        let content = &region[active.start_pos - base..at - base];
        if !content.trim().is_empty() {
            let id = reg.next_id();
            let block = self.build_block(id, active.start_pos, content, active.mode);
            debug!(
                id = block.id.0,
                kind = ?block.kind,
                start = block.start_pos,
                len = block.content.len(),
                "committed block"
            );
            reg.push(block);
        }
        reg.active = Some(ActiveBlock::new(at));
    }

    fn build_block(&self, id: BlockId, start_pos: usize, content: &str, mode: BlockMode) -> StableBlock {
        let mode = match mode {
            BlockMode::Unknown => start_mode(first_line(content), start_pos, self.opts.components),
            m => m,
        };
        let mut kind = mode.kind();

        let extraction = (self.opts.components && kind != BlockKind::CodeBlock)
            .then(|| extract_components(content, start_pos, self.component_registry()));
        let (markdown, components) = match extraction {
            Some(ex) => (ex.markdown, ex.components),
            None => (content.to_string(), Vec::new()),
        };

        let meta = match mode {
            BlockMode::Heading { level } => BlockMeta::Heading { level },
            BlockMode::CodeFence { .. } => meta::code_block(content),
            BlockMode::List => meta::list(content),
            BlockMode::Table => meta::table(content),
            BlockMode::Component { .. } => match components.first() {
                Some(instance) => BlockMeta::Component {
                    instance: instance.clone(),
                },
                None => BlockMeta::None,
            },
            BlockMode::Paragraph | BlockMode::Unknown => match lone_image(content) {
                Some(img) => {
                    kind = BlockKind::Image;
                    BlockMeta::Image {
                        alt: img.alt,
                        url: img.url,
                        title: img.title,
                    }
                }
                None => BlockMeta::None,
            },
            BlockMode::HorizontalRule | BlockMode::Blockquote => BlockMeta::None,
        };

        let ast = (self.opts.parse_stable_blocks && kind != BlockKind::Component)
            .then(|| self.parser.parse_block(&markdown))
            .flatten();

        StableBlock {
            id,
            kind,
            content: content.to_string(),
            content_hash: ContentHash::of(content),
            meta,
            ast,
            components,
            start_pos,
        }
    }

    fn refresh_active(&self, reg: &mut BlockRegistry, region: &str, base: usize) {
        let registry = self.component_registry();
        let Some(active) = reg.active.as_mut() else {
            return;
        };
        let content = &region[active.start_pos - base..];
        let fed = active.tag_state.len();
        active.tag_state.update(&content[fed..]);
        active.content.clear();
        active.content.push_str(content);

        active.kind = match active.mode {
            BlockMode::Unknown if self.opts.components && could_be_directive_start(content) => {
                BlockKind::Component
            }
            BlockMode::Unknown => {
                start_mode(first_line(content), active.start_pos, self.opts.components).kind()
            }
            m => m.kind(),
        };

        if self.opts.components && active.kind != BlockKind::CodeBlock {
            let ex = extract_components(content, active.start_pos, registry);
            // Offsets in the tracked state refer to `content`, not to the marker-substituted text.
            let rescan;
            let state = if ex.markdown == content {
                &active.tag_state
            } else {
                rescan = TagState::new();
                &rescan
            };
            active.display = fix_incomplete_markdown_with(&ex.markdown, state, &self.opts);
            active.components = ex.components;
            active.last_cleanup = ex.last_cleanup;
        } else {
            active.display = fix_incomplete_markdown_with(content, &active.tag_state, &self.opts);
            active.components.clear();
            active.last_cleanup = None;
        }
    }
}

fn first_line(content: &str) -> &str {
    content.split('\n').next().unwrap_or(content)
}

/// Commit at the end of the line on which the directive starting at `start` closes.
fn directive_step(region: &str, base: usize, start: usize, next: usize) -> LineStep {
    let (end, closed) = directive_end(region, start - base);
    if closed && base + end <= next {
        LineStep::CommitAt(next)
    } else {
        LineStep::Continue
    }
}
