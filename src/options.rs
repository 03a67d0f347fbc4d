use serde::{Deserialize, Serialize};

use crate::pending::DEFAULT_INCOMPLETE_LINK_URL;

/// What `process_new_content` does when the full text is shorter than what was already consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Keep the registry unchanged. Stable blocks are never rolled back.
    Ignore,
    /// Drop stable blocks that extend past the new end of text and re-split from the last block
    /// that is still fully present.
    ///
    /// Block ids keep increasing, so re-created blocks never reuse an id.
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Destination used when an unfinished link is auto-closed for display.
    pub incomplete_link_url: String,
    /// Treat `Title\n---` as a heading rather than a paragraph followed by a rule.
    pub setext_headings: bool,
    /// Recognize `[{c:"Name",p:{...}}]` directives as component blocks.
    pub components: bool,
    /// Attach a parsed tree to every stable block (except components).
    pub parse_stable_blocks: bool,
    pub truncation: TruncationPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            incomplete_link_url: DEFAULT_INCOMPLETE_LINK_URL.to_string(),
            setext_headings: true,
            components: true,
            parse_stable_blocks: true,
            truncation: TruncationPolicy::Ignore,
        }
    }
}
