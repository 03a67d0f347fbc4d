use crate::options::Options;
use crate::tags::{OpenTag, TagKind, TagState};

pub const DEFAULT_INCOMPLETE_LINK_URL: &str = "markstream:incomplete-link";

/// Close or hide dangling markup so a partial block renders without flicker.
///
/// Open tags with nothing after their opening marker are removed; the rest are closed from the
/// innermost outwards. Applying the function to its own output returns that output unchanged.
pub fn fix_incomplete_markdown(text: &str, state: &TagState) -> String {
    fix_with_link_url(text, state, DEFAULT_INCOMPLETE_LINK_URL)
}

pub fn fix_incomplete_markdown_with(text: &str, state: &TagState, opts: &Options) -> String {
    fix_with_link_url(text, state, &opts.incomplete_link_url)
}

fn fix_with_link_url(text: &str, state: &TagState, incomplete_link_url: &str) -> String {
    // `state` only narrows the rescan when it describes exactly this text.
    let start = if text.len() == state.len() {
        state.earliest_position().min(text.len())
    } else {
        0
    };
    let scanned = TagState::scan_from(text, start);
    let tags = scanned.stack();
    if tags.is_empty() {
        return text.to_string();
    }

    // A closer can merge with a marker already at the end of the text (`~~a~` + `~~`). When the
    // closed text does not rescan as balanced, drop the innermost remaining tag and its content.
    let mut keep = tags.len();
    loop {
        let cut = tags.get(keep).map_or(text.len(), |tag| tag.position);
        let (out, open) = close_tags(&text[..cut], &tags[..keep], incomplete_link_url);
        if open == 0 || TagState::scan_from(&out, start).stack().is_empty() {
            return out;
        }
        keep = open - 1;
    }
}

/// Returns the closed text and how many of `tags` were closed rather than elided.
fn close_tags(text: &str, tags: &[OpenTag], incomplete_link_url: &str) -> (String, usize) {
    let mut out = text.to_string();
    let mut open = tags.len();
    while open > 0 && is_elidable(&tags[open - 1], &out) {
        out.truncate(tags[open - 1].position);
        open -= 1;
    }

    for tag in tags[..open].iter().rev() {
        close_tag(tag, &mut out, incomplete_link_url);
    }
    (out, open)
}

/// Content after an opener once trailing whitespace and a dangling escape are ignored.
fn settled(s: &str) -> &str {
    let s = s.trim_end();
    let backslashes = s.bytes().rev().take_while(|&b| b == b'\\').count();
    if backslashes % 2 == 1 {
        s[..s.len() - 1].trim_end()
    } else {
        s
    }
}

fn is_elidable(tag: &OpenTag, out: &str) -> bool {
    match tag.kind {
        TagKind::Component => true,
        TagKind::LinkDestination => false,
        _ => out
            .get(tag.position + tag.opening_text.len()..)
            .is_none_or(|rest| settled(rest).trim_start().is_empty()),
    }
}

fn close_tag(tag: &OpenTag, out: &mut String, incomplete_link_url: &str) {
    match tag.kind {
        TagKind::CodeBlock => {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&tag.opening_text);
        }
        TagKind::InlineCode => out.push_str(&tag.opening_text),
        TagKind::Bold | TagKind::Italic | TagKind::Strikethrough => {
            let keep = settled(out).len();
            out.truncate(keep);
            out.push_str(&tag.opening_text);
        }
        TagKind::Link => {
            let keep = settled(out).len();
            out.truncate(keep);
            out.push_str("](");
            out.push_str(incomplete_link_url);
            out.push(')');
        }
        TagKind::LinkDestination => {
            if out.ends_with("](") {
                out.push_str(incomplete_link_url);
            }
            out.push(')');
        }
        TagKind::Component => out.truncate(tag.position),
    }
}
