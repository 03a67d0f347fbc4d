mod support;

use markstream::{BlockKind, Options, Splitter};
use pretty_assertions::assert_eq;
use support::*;

const DOC: &str = "# Title\n\nIntro with **bold** and `code`.\nStill intro.\n\n- one\n- two\n  continued\n\n> quoted\n> more\n\n| a | b |\n|---|:-:|\n| 1 | 2 |\n\n```rust\nfn main() {\n\n    println!(\"hi\");\n}\n```\n\n[{c:\"Card\",p:{\"title\":\"Hé\",\"n\":[1,2]}}]\n\nSetext\n======\n\n---\n\nTail paragraph with émojis 🎉 and [a link](https://example.com).\n";

fn splitter() -> Splitter {
    Splitter::plain_text(Options::default())
}

#[test]
fn block_boundaries_do_not_depend_on_chunking() {
    let s = splitter();
    let whole = final_contents(&s, chunk_whole(DOC));
    assert_eq!(whole.len(), 10);

    assert_eq!(final_contents(&s, chunk_lines(DOC)), whole);
    assert_eq!(final_contents(&s, chunk_chars(DOC)), whole);
    for seed in [1, 7, 42, 1337, 9001] {
        assert_eq!(final_contents(&s, chunk_pseudo_random(DOC, seed)), whole, "seed={seed}");
    }
}

#[test]
fn split_all_matches_streaming() {
    let s = splitter();
    let reg = s.split_all(DOC);
    let kinds: Vec<BlockKind> = reg.blocks().iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::Heading,
            BlockKind::Paragraph,
            BlockKind::List,
            BlockKind::Blockquote,
            BlockKind::Table,
            BlockKind::CodeBlock,
            BlockKind::Component,
            BlockKind::Heading,
            BlockKind::HorizontalRule,
            BlockKind::Paragraph,
        ]
    );
    let streamed = stream(&s, chunk_chars(DOC));
    let last = streamed.last().map(|r| r.blocks().to_vec()).unwrap_or_default();
    let ids: Vec<u64> = last.iter().map(|b| b.id.0).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
    let mut prev_end = 0;
    for block in reg.blocks() {
        assert!(block.start_pos >= prev_end);
        assert_eq!(&DOC[block.start_pos..block.end_pos()], block.content);
        prev_end = block.end_pos();
    }
    for (a, b) in reg.blocks().iter().zip(&last) {
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.meta, b.meta);
        assert_eq!(a.start_pos, b.start_pos);
    }
}

#[test]
fn stable_blocks_never_change_once_emitted() {
    let s = splitter();
    let snapshots = stream(&s, chunk_pseudo_random(DOC, 3));
    for pair in snapshots.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!(next.blocks().len() >= prev.blocks().len());
        for (a, b) in prev.blocks().iter().zip(next.blocks()) {
            assert!(std::sync::Arc::ptr_eq(a, b));
        }
        assert!(next.cursor() >= prev.cursor());
    }
}

#[test]
fn crlf_input_keeps_boundaries() {
    let s = splitter();
    let text = "# A\r\n\r\nbody\r\nmore\r\n\r\n- x\r\n";
    let whole = final_contents(&s, chunk_whole(text));
    assert_eq!(whole, vec!["# A\r\n", "body\r\nmore\r\n\r\n", "- x\r\n"]);
    assert_eq!(final_contents(&s, chunk_chars(text)), whole);
}

#[test]
fn directive_ended_by_its_line_splits_the_same_way() {
    let s = splitter();
    let text = "[{c:\"Card\",p:{\"t\":1}}\nHello\n\n";
    let whole = final_contents(&s, chunk_whole(text));
    assert_eq!(whole, vec!["[{c:\"Card\",p:{\"t\":1}}\n", "Hello\n\n"]);
    assert_eq!(final_contents(&s, chunk_lines(text)), whole);
    assert_eq!(final_contents(&s, chunk_chars(text)), whole);
}
