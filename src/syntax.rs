//! Line-level Markdown heuristics shared by the splitter, the tag tracker and block metadata.
//!
//! Every function here looks at a single line (without its trailing `\n`; a trailing `\r` is
//! tolerated) and never allocates unless it returns owned data.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFenceHeader<'a> {
    pub fence_char: char,
    pub fence_len: usize,
    /// Entire info string (trimmed), excluding fence markers.
    pub info: &'a str,
    /// First token of `info`. `None` means "no language".
    pub language: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    pub ordered: bool,
    /// Start number of an ordered list item.
    pub start: Option<u64>,
    /// Byte offset of the item content within the line.
    pub content_offset: usize,
}

fn is_space_or_tab(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub(crate) fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

pub(crate) fn strip_up_to_three_leading_spaces(line: &str) -> &str {
    let mut s = line;
    let mut spaces = 0usize;
    while spaces < 3 && s.starts_with(' ') {
        s = &s[1..];
        spaces += 1;
    }
    s
}

pub fn is_empty_line(line: &str) -> bool {
    line.trim().is_empty()
}

/// ATX heading level of a complete line (`#` through `######` followed by whitespace or the end
/// of the line).
pub fn heading_level(line: &str) -> Option<u8> {
    let s = strip_up_to_three_leading_spaces(strip_cr(line));
    let hashes = s.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match s.as_bytes().get(hashes) {
        None => Some(hashes as u8),
        Some(&b) if is_space_or_tab(b) => Some(hashes as u8),
        _ => None,
    }
}

/// Like [`heading_level`], but only accepts a prefix that can no longer turn into something else
/// as more characters arrive (the hashes must already be followed by whitespace).
pub fn heading_prefix_level(partial_line: &str) -> Option<u8> {
    let s = strip_up_to_three_leading_spaces(partial_line);
    let hashes = s.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match s.as_bytes().get(hashes) {
        Some(&b) if is_space_or_tab(b) => Some(hashes as u8),
        _ => None,
    }
}

pub fn thematic_break_char(line: &str) -> Option<char> {
    // CommonMark-like thematic break:
    // - up to 3 leading spaces
    // - one of '-', '*', '_' repeated >= 3
    // - spaces/tabs may appear between markers
    let s = strip_up_to_three_leading_spaces(strip_cr(line));
    let s = s.trim_end_matches([' ', '\t']);
    let mut it = s.chars();
    let first = it.next()?;
    if first != '-' && first != '*' && first != '_' {
        return None;
    }
    let mut count = 1usize;
    for c in it {
        if c == first {
            count += 1;
            continue;
        }
        if c == ' ' || c == '\t' {
            continue;
        }
        return None;
    }
    if count >= 3 { Some(first) } else { None }
}

pub fn is_thematic_break(line: &str) -> bool {
    thematic_break_char(line).is_some()
}

pub fn setext_underline_char(line: &str) -> Option<char> {
    // Best-effort setext underline: '=' or '-' repeated >= 2 after up to 3 spaces.
    let s = strip_up_to_three_leading_spaces(strip_cr(line));
    let s = s.trim_end_matches([' ', '\t']);
    let mut it = s.chars();
    let first = it.next()?;
    if first != '=' && first != '-' {
        return None;
    }
    if it.all(|c| c == first) && s.len() >= 2 {
        Some(first)
    } else {
        None
    }
}

pub fn parse_code_fence_header(line: &str) -> Option<CodeFenceHeader<'_>> {
    // Fence opening line: up to 3 leading spaces, then ``` or ~~~ (>=3); the info string is the
    // rest of the line after the fence run.
    let s = strip_up_to_three_leading_spaces(strip_cr(line));
    let bytes = s.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    let fence_char = bytes[0] as char;
    if fence_char != '`' && fence_char != '~' {
        return None;
    }
    let fence_len = bytes.iter().take_while(|&&b| b == bytes[0]).count();
    if fence_len < 3 {
        return None;
    }

    let info = s[fence_len..].trim();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    let language = info.split_whitespace().next();

    Some(CodeFenceHeader {
        fence_char,
        fence_len,
        info,
        language,
    })
}

pub fn parse_code_fence_header_from_block(text: &str) -> Option<CodeFenceHeader<'_>> {
    let first_line = text.split('\n').next().unwrap_or(text);
    parse_code_fence_header(first_line)
}

pub fn is_code_fence_closing_line(line: &str, fence_char: char, fence_len: usize) -> bool {
    let s = strip_up_to_three_leading_spaces(strip_cr(line));
    let trimmed = s.trim_end();
    let mut count = 0usize;
    for ch in trimmed.chars() {
        if ch != fence_char {
            return false;
        }
        count += 1;
    }
    count >= fence_len
}

pub fn is_blockquote_start(line: &str) -> bool {
    strip_up_to_three_leading_spaces(line).starts_with('>')
}

pub fn list_marker(line: &str) -> Option<ListMarker> {
    let indent = line.len() - line.trim_start().len();
    let s = &line[indent..];
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    match bytes[0] {
        b'-' | b'+' | b'*' => {
            if is_space_or_tab(bytes[1]) {
                Some(ListMarker {
                    ordered: false,
                    start: None,
                    content_offset: indent + 2,
                })
            } else {
                None
            }
        }
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 || digits + 1 >= bytes.len() {
                return None;
            }
            if !matches!(bytes[digits], b'.' | b')') || !is_space_or_tab(bytes[digits + 1]) {
                return None;
            }
            Some(ListMarker {
                ordered: true,
                start: s[..digits].parse().ok(),
                content_offset: indent + digits + 2,
            })
        }
        _ => None,
    }
}

pub fn is_list_item_start(line: &str) -> bool {
    list_marker(line).is_some()
}

/// Indented content or a nested list item that keeps a list block open.
pub fn is_list_continuation(line: &str) -> bool {
    if is_list_item_start(line) {
        return true;
    }
    line.starts_with('\t') || line.starts_with("  ")
}

pub fn is_table_delimiter(line: &str) -> bool {
    let s = strip_cr(line).trim();
    if s.is_empty() {
        return false;
    }
    let mut has_dash = false;
    for c in s.chars() {
        match c {
            '|' | ':' | ' ' | '\t' => {}
            '-' => has_dash = true,
            _ => return false,
        }
    }
    has_dash
}

/// Split a pipe table row into trimmed cells. Escaped pipes (`\|`) stay inside their cell.
pub fn split_table_row(line: &str) -> Vec<String> {
    let s = strip_cr(line).trim();
    let s = s.strip_prefix('|').unwrap_or(s);
    let s = if s.ends_with('|') && !s.ends_with("\\|") {
        &s[..s.len() - 1]
    } else {
        s
    };

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// `[{c:` (or the quoted-key variant `[{"c":`) after optional indentation.
pub fn is_directive_start(line: &str) -> bool {
    let s = line.trim_start();
    s.starts_with("[{c:") || s.starts_with("[{\"c\":")
}

/// Whether a partial line could still grow into a directive opener.
pub fn could_be_directive_start(partial_line: &str) -> bool {
    let s = partial_line.trim_start();
    !s.is_empty() && ("[{c:".starts_with(s) || "[{\"c\":".starts_with(s))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub alt: String,
    pub url: String,
    pub title: Option<String>,
}

/// Parse a block that consists of nothing but a single `![alt](url "title")`.
pub fn lone_image(text: &str) -> Option<ImageRef> {
    let s = text.trim();
    let rest = s.strip_prefix("![")?;
    let close = rest.find("](")?;
    let alt = &rest[..close];
    let dest = rest[close + 2..].strip_suffix(')')?;
    if alt.contains('\n') || dest.contains(['\n', '(', ')']) {
        return None;
    }
    let dest = dest.trim();
    let (url, title) = match dest.find(char::is_whitespace) {
        Some(split) => {
            let title = dest[split..].trim();
            let title = title
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(title);
            (&dest[..split], Some(title.to_string()))
        }
        None => (dest, None),
    };
    let url = url
        .strip_prefix('<')
        .and_then(|u| u.strip_suffix('>'))
        .unwrap_or(url);
    if url.is_empty() {
        return None;
    }
    Some(ImageRef {
        alt: alt.to_string(),
        url: url.to_string(),
        title,
    })
}
