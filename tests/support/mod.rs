#![allow(dead_code)]

use markstream::{BlockRegistry, Splitter};

pub fn chunk_whole(text: &str) -> Vec<String> {
    vec![text.to_string()]
}

pub fn chunk_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(|s| s.to_string()).collect()
}

pub fn chunk_chars(text: &str) -> Vec<String> {
    text.chars().map(|c| c.to_string()).collect()
}

pub fn chunk_pseudo_random(text: &str, mut seed: u32) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        // LCG
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        let want = (seed % 24 + 1) as usize;
        let mut end = (start + want).min(text.len());
        while end < text.len() && !text.is_char_boundary(end) {
            end += 1;
        }
        out.push(text[start..end].to_string());
        start = end;
    }
    out
}

/// Concatenate `len` pieces picked with the same LCG as [`chunk_pseudo_random`].
pub fn pseudo_random_text(pieces: &[&str], len: usize, mut seed: u32) -> String {
    let mut out = String::new();
    for _ in 0..len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        out.push_str(pieces[(seed >> 8) as usize % pieces.len()]);
    }
    out
}

/// Feed `chunks` as a growing text and return every snapshot, the finalized one last.
pub fn stream(splitter: &Splitter, chunks: impl IntoIterator<Item = String>) -> Vec<BlockRegistry> {
    let mut text = String::new();
    let mut reg = splitter.reset_registry();
    let mut snapshots = Vec::new();
    for chunk in chunks {
        text.push_str(&chunk);
        reg = splitter.process_new_content(&reg, &text);
        snapshots.push(reg.clone());
    }
    snapshots.push(splitter.finalize_active_block(&reg));
    snapshots
}

pub fn final_contents(splitter: &Splitter, chunks: impl IntoIterator<Item = String>) -> Vec<String> {
    stream(splitter, chunks)
        .last()
        .map(|reg| reg.blocks().iter().map(|b| b.content.clone()).collect())
        .unwrap_or_default()
}
