//! Incremental tracking of open inline and fenced markup.
//!
//! [`TagState`] is fed only the text appended since the previous call. Markers whose meaning
//! depends on characters that have not arrived yet (a trailing `*`, a fence run at the start of
//! a line, `[{` that may become a directive, ...) are held back in a small carried tail and
//! decided once enough input is available, so chunking never changes the resulting state.

use crate::syntax::{
    is_code_fence_closing_line, parse_code_fence_header, strip_up_to_three_leading_spaces,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Bold,
    Italic,
    Strikethrough,
    InlineCode,
    CodeBlock,
    Link,
    LinkDestination,
    Component,
}

impl TagKind {
    pub const ALL: [TagKind; 8] = [
        TagKind::Bold,
        TagKind::Italic,
        TagKind::Strikethrough,
        TagKind::InlineCode,
        TagKind::CodeBlock,
        TagKind::Link,
        TagKind::LinkDestination,
        TagKind::Component,
    ];

    const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }

    /// Inline spans cannot outlive the paragraph they were opened in.
    pub fn is_inline(self) -> bool {
        !matches!(self, TagKind::CodeBlock | TagKind::Component)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTag {
    pub kind: TagKind,
    /// Byte offset of the opening marker. A link destination keeps the offset of its `[`.
    pub position: usize,
    /// The exact marker text (`**`, `_`, a fence run, `[`, `](`, ...).
    pub opening_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DirectiveScan {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Advance(usize),
    /// Not enough input to decide; everything from the current offset is carried.
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagState {
    stack: Vec<OpenTag>,
    counts: [usize; TagKind::COUNT],
    in_code_block: bool,
    fed: usize,
    carry: String,
    at_line_start: bool,
    line_blank: bool,
    prev_char: Option<char>,
    directive: DirectiveScan,
}

impl Default for TagState {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            counts: [0; TagKind::COUNT],
            in_code_block: false,
            fed: 0,
            carry: String::new(),
            at_line_start: true,
            line_blank: true,
            prev_char: None,
            directive: DirectiveScan::default(),
        }
    }
}

/// Pure form of [`TagState::update`].
pub fn update_tag_state(prev: &TagState, suffix: &str) -> TagState {
    let mut next = prev.clone();
    next.update(suffix);
    next
}

impl TagState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open tags, innermost last.
    pub fn stack(&self) -> &[OpenTag] {
        &self.stack
    }

    pub fn innermost(&self) -> Option<&OpenTag> {
        self.stack.last()
    }

    pub fn tag_count(&self, kind: TagKind) -> usize {
        self.counts[kind.index()]
    }

    pub fn tag_counts(&self) -> impl Iterator<Item = (TagKind, usize)> + '_ {
        TagKind::ALL.iter().map(|&k| (k, self.counts[k.index()]))
    }

    pub fn in_code_block(&self) -> bool {
        self.in_code_block
    }

    pub fn is_balanced(&self) -> bool {
        self.stack.is_empty() && self.carry.is_empty()
    }

    /// Total number of bytes fed so far.
    pub fn len(&self) -> usize {
        self.fed
    }

    pub fn is_empty(&self) -> bool {
        self.fed == 0
    }

    /// Trailing input whose interpretation is still undecided.
    pub fn pending_tail(&self) -> &str {
        &self.carry
    }

    /// Offset before which every construct is closed: the oldest open tag, else the start of the
    /// undecided tail, else the number of bytes fed.
    pub fn earliest_position(&self) -> usize {
        match self.stack.first() {
            Some(tag) => tag.position,
            None => self.fed - self.carry.len(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed the text appended since the previous call.
    pub fn update(&mut self, suffix: &str) {
        if suffix.is_empty() {
            return;
        }
        let base = self.fed - self.carry.len();
        self.fed += suffix.len();
        let mut buf = std::mem::take(&mut self.carry);
        buf.push_str(suffix);
        let consumed = self.scan(&buf, base, false);
        if consumed < buf.len() {
            self.carry = buf.split_off(consumed);
        }
    }

    /// Scan `text[start..]` to its end with a context that assumes everything before `start`
    /// is closed.
    pub(crate) fn scan_from(text: &str, start: usize) -> TagState {
        let start = if text.is_char_boundary(start) { start } else { 0 };
        let before = &text[..start];
        let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
        let at_line_start = start == line_start;
        let mut state = TagState {
            fed: text.len(),
            at_line_start,
            line_blank: before[line_start..].trim().is_empty(),
            prev_char: if at_line_start {
                None
            } else {
                before.chars().last()
            },
            ..TagState::default()
        };
        state.scan(&text[start..], start, true);
        state
    }

    fn push(&mut self, kind: TagKind, position: usize, opening_text: &str) {
        self.counts[kind.index()] += 1;
        self.stack.push(OpenTag {
            kind,
            position,
            opening_text: opening_text.to_string(),
        });
    }

    fn pop(&mut self) -> Option<OpenTag> {
        let tag = self.stack.pop()?;
        self.counts[tag.kind.index()] -= 1;
        Some(tag)
    }

    fn top_kind(&self) -> Option<TagKind> {
        self.stack.last().map(|t| t.kind)
    }

    fn unwind_inline(&mut self) {
        while self.top_kind().is_some_and(TagKind::is_inline) {
            self.pop();
        }
    }

    fn note_char(&mut self, c: char) {
        self.prev_char = Some(c);
        if !c.is_whitespace() {
            self.line_blank = false;
        }
    }

    fn end_line(&mut self) {
        if self.line_blank {
            self.unwind_inline();
        }
        self.at_line_start = true;
        self.line_blank = true;
        self.prev_char = None;
    }

    fn skip_line(&mut self, text: &str, i: usize) -> Step {
        match text[i..].find('\n') {
            Some(rel) => {
                self.at_line_start = true;
                self.line_blank = true;
                self.prev_char = None;
                Step::Advance(i + rel + 1)
            }
            None => {
                self.at_line_start = false;
                Step::Advance(text.len())
            }
        }
    }

    fn scan(&mut self, text: &str, base: usize, finishing: bool) -> usize {
        let mut i = 0usize;
        while i < text.len() {
            let step = if self.at_line_start {
                self.scan_line_start(text, i, base, finishing)
            } else if self.in_code_block {
                self.skip_line(text, i)
            } else {
                match self.top_kind() {
                    Some(TagKind::Component) => self.scan_directive(text, i),
                    Some(TagKind::InlineCode) => self.scan_code_span(text, i, finishing),
                    Some(TagKind::LinkDestination) => self.scan_link_destination(text, i),
                    _ => self.scan_inline(text, i, base, finishing),
                }
            };
            match step {
                Step::Advance(next) => i = next,
                Step::Pause => return i,
            }
        }
        text.len()
    }

    fn scan_line_start(&mut self, text: &str, i: usize, base: usize, finishing: bool) -> Step {
        let rest = &text[i..];
        let line_end = rest.find('\n');
        let line = &rest[..line_end.unwrap_or(rest.len())];

        if self.in_code_block {
            let Some((fence_char, fence_len)) = self
                .stack
                .last()
                .filter(|t| t.kind == TagKind::CodeBlock)
                .and_then(|t| Some((t.opening_text.chars().next()?, t.opening_text.len())))
            else {
                self.in_code_block = false;
                return Step::Advance(i);
            };
            if line_end.is_none() && !finishing {
                let candidate = strip_up_to_three_leading_spaces(line)
                    .trim_end()
                    .chars()
                    .all(|c| c == fence_char);
                if candidate {
                    return Step::Pause;
                }
                return self.skip_line(text, i);
            }
            if is_code_fence_closing_line(line, fence_char, fence_len) {
                self.pop();
                self.in_code_block = false;
            }
            return self.skip_line(text, i);
        }

        let after = strip_up_to_three_leading_spaces(rest);
        if after.is_empty() {
            if !finishing {
                return Step::Pause;
            }
            self.at_line_start = false;
            return Step::Advance(i);
        }

        let first = after.as_bytes()[0];
        if first == b'`' || first == b'~' {
            let run = after.bytes().take_while(|&b| b == first).count();
            if run == after.len() && !finishing {
                return Step::Pause;
            }
            if run >= 3 {
                // The info string decides whether this is a fence at all.
                if line_end.is_none() && !finishing {
                    return Step::Pause;
                }
                if parse_code_fence_header(line).is_some() {
                    self.unwind_inline();
                    self.push(TagKind::CodeBlock, base + i, &after[..run]);
                    self.in_code_block = true;
                    return self.skip_line(text, i);
                }
            }
        }

        self.at_line_start = false;
        Step::Advance(i)
    }

    fn scan_inline(&mut self, text: &str, i: usize, base: usize, finishing: bool) -> Step {
        let bytes = text.as_bytes();
        match bytes[i] {
            b'\n' => {
                self.end_line();
                Step::Advance(i + 1)
            }
            b'\\' => match text[i + 1..].chars().next() {
                None if !finishing => Step::Pause,
                None | Some('\n') => {
                    self.note_char('\\');
                    Step::Advance(i + 1)
                }
                Some(escaped) => {
                    self.line_blank = false;
                    self.note_char(escaped);
                    Step::Advance(i + 1 + escaped.len_utf8())
                }
            },
            b'*' | b'_' => self.scan_emphasis_run(text, i, base, finishing),
            b'~' => self.scan_strikethrough_run(text, i, base, finishing),
            b'`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                if i + run == text.len() && !finishing {
                    return Step::Pause;
                }
                self.push(TagKind::InlineCode, base + i, &text[i..i + run]);
                self.note_char('`');
                Step::Advance(i + run)
            }
            b'[' => {
                let rest = &text[i..];
                if rest.starts_with("[{c:") || rest.starts_with("[{\"c\":") {
                    self.push(TagKind::Component, base + i, "[{");
                    self.directive = DirectiveScan {
                        depth: 1,
                        ..DirectiveScan::default()
                    };
                    self.note_char('{');
                    return Step::Advance(i + 2);
                }
                if "[{c:".starts_with(rest) || "[{\"c\":".starts_with(rest) {
                    if !finishing {
                        return Step::Pause;
                    }
                    // A directive opener cut off by the end of the input.
                    self.push(TagKind::Component, base + i, rest);
                    return Step::Advance(text.len());
                }
                self.push(TagKind::Link, base + i, "[");
                self.note_char('[');
                Step::Advance(i + 1)
            }
            b'!' => match bytes.get(i + 1) {
                None if !finishing => Step::Pause,
                Some(b'[') => {
                    self.push(TagKind::Link, base + i, "![");
                    self.note_char('[');
                    Step::Advance(i + 2)
                }
                _ => {
                    self.note_char('!');
                    Step::Advance(i + 1)
                }
            },
            b']' if self.top_kind() == Some(TagKind::Link) => match bytes.get(i + 1) {
                None if !finishing => Step::Pause,
                Some(b'(') => {
                    let start = self.pop().map_or(base + i, |link| link.position);
                    self.push(TagKind::LinkDestination, start, "](");
                    self.note_char('(');
                    Step::Advance(i + 2)
                }
                _ => {
                    self.pop();
                    self.note_char(']');
                    Step::Advance(i + 1)
                }
            },
            _ => {
                let next = text[i..]
                    .find(|c: char| matches!(c, '\n' | '\\' | '*' | '_' | '~' | '`' | '[' | '!' | ']'))
                    .map_or(text.len(), |rel| i + rel);
                let next = if next == i {
                    // A lone ']' that closes nothing.
                    i + 1
                } else {
                    next
                };
                let plain = &text[i..next];
                if let Some(last) = plain.chars().last() {
                    if !plain.trim().is_empty() {
                        self.line_blank = false;
                    }
                    self.prev_char = Some(last);
                }
                Step::Advance(next)
            }
        }
    }

    fn scan_emphasis_run(&mut self, text: &str, i: usize, base: usize, finishing: bool) -> Step {
        let marker = text.as_bytes()[i];
        let run = text.as_bytes()[i..]
            .iter()
            .take_while(|&&b| b == marker)
            .count();
        let end = i + run;
        if end == text.len() && !finishing {
            return Step::Pause;
        }

        let prev = self.prev_char;
        let next = text[end..].chars().next();
        let intraword_underscore = marker == b'_'
            && prev.is_some_and(char::is_alphanumeric)
            && next.is_some_and(char::is_alphanumeric);

        if !intraword_underscore {
            // End of input counts as "may still open": a trailing marker is treated as an opener
            // with no content yet.
            let can_close = prev.is_some_and(|c| !c.is_whitespace());
            let can_open = next.is_none_or(|c| !c.is_whitespace());
            let mut remaining = run;
            if can_close {
                remaining = self.close_emphasis(marker, run);
            }
            if remaining == run && can_open {
                self.open_emphasis(marker, run, base + i);
            }
        }

        self.note_char(marker as char);
        Step::Advance(end)
    }

    fn close_emphasis(&mut self, marker: u8, mut remaining: usize) -> usize {
        while remaining > 0 {
            let Some(top) = self.stack.last() else {
                break;
            };
            if !matches!(top.kind, TagKind::Bold | TagKind::Italic)
                || top.opening_text.as_bytes().first() != Some(&marker)
            {
                break;
            }
            let width = top.opening_text.len();
            if width > remaining {
                break;
            }
            remaining -= width;
            self.pop();
        }
        remaining
    }

    fn open_emphasis(&mut self, marker: u8, run: usize, position: usize) {
        let single = (marker as char).to_string();
        let double = single.repeat(2);
        match run {
            1 => self.push(TagKind::Italic, position, &single),
            2 => self.push(TagKind::Bold, position, &double),
            _ => {
                self.push(TagKind::Bold, position, &double);
                self.push(TagKind::Italic, position + 2, &single);
            }
        }
    }

    fn scan_strikethrough_run(&mut self, text: &str, i: usize, base: usize, finishing: bool) -> Step {
        let run = text.as_bytes()[i..]
            .iter()
            .take_while(|&&b| b == b'~')
            .count();
        let end = i + run;
        if end == text.len() && !finishing {
            return Step::Pause;
        }
        // Only a double tilde is a delimiter; longer runs stay literal.
        if run == 2 {
            let can_close = self.prev_char.is_some_and(|c| !c.is_whitespace());
            let can_open = text[end..].chars().next().is_none_or(|c| !c.is_whitespace());
            if can_close && self.top_kind() == Some(TagKind::Strikethrough) {
                self.pop();
            } else if can_open {
                self.push(TagKind::Strikethrough, base + i, "~~");
            }
        }
        self.note_char('~');
        Step::Advance(end)
    }

    fn scan_code_span(&mut self, text: &str, i: usize, finishing: bool) -> Step {
        let bytes = text.as_bytes();
        match bytes[i] {
            b'`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                if i + run == text.len() && !finishing {
                    return Step::Pause;
                }
                if self.stack.last().is_some_and(|t| t.opening_text.len() == run) {
                    self.pop();
                }
                self.note_char('`');
                Step::Advance(i + run)
            }
            b'\n' => {
                self.end_line();
                // Inline code never starts a fence: keep scanning inline on the next line.
                if self.top_kind() == Some(TagKind::InlineCode) {
                    self.at_line_start = false;
                }
                Step::Advance(i + 1)
            }
            _ => {
                let next = text[i..]
                    .find(['`', '\n'])
                    .map_or(text.len(), |rel| i + rel);
                let content = &text[i..next];
                if !content.trim().is_empty() {
                    self.line_blank = false;
                }
                self.prev_char = content.chars().last().or(self.prev_char);
                Step::Advance(next)
            }
        }
    }

    fn scan_link_destination(&mut self, text: &str, i: usize) -> Step {
        match text.as_bytes()[i] {
            b')' => {
                self.pop();
                self.note_char(')');
                Step::Advance(i + 1)
            }
            b'\n' => {
                self.end_line();
                Step::Advance(i + 1)
            }
            _ => {
                let next = text[i..]
                    .find([')', '\n'])
                    .map_or(text.len(), |rel| i + rel);
                self.line_blank = false;
                self.prev_char = text[i..next].chars().last().or(self.prev_char);
                Step::Advance(next)
            }
        }
    }

    fn scan_directive(&mut self, text: &str, i: usize) -> Step {
        let Some(c) = text[i..].chars().next() else {
            return Step::Advance(text.len());
        };
        let d = &mut self.directive;
        if d.in_string {
            if d.escaped {
                d.escaped = false;
            } else if c == '\\' {
                d.escaped = true;
            } else if c == '"' {
                d.in_string = false;
            }
        } else {
            match c {
                '"' => d.in_string = true,
                '{' | '[' => d.depth += 1,
                '}' => d.depth = d.depth.saturating_sub(1),
                ']' if d.depth > 0 => d.depth -= 1,
                ']' => {
                    self.pop();
                    self.directive = DirectiveScan::default();
                    self.note_char(']');
                    return Step::Advance(i + 1);
                }
                '\n' if d.depth == 0 => {
                    // Balanced braces and the line ended without `]`.
                    self.pop();
                    self.directive = DirectiveScan::default();
                    return Step::Advance(i);
                }
                c if d.depth == 0 && !c.is_whitespace() => {
                    // `}` was not followed by `]`: the directive is malformed and ends here.
                    self.pop();
                    self.directive = DirectiveScan::default();
                    return Step::Advance(i);
                }
                _ => {}
            }
        }
        if c != '\n' {
            self.line_blank = false;
        }
        self.prev_char = Some(c);
        Step::Advance(i + c.len_utf8())
    }
}
