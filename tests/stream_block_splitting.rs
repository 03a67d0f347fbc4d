use markstream::{BlockKind, BlockMeta, BlockRegistry, Options, Splitter};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn splitter() -> Splitter {
    Splitter::plain_text(Options::default())
}

fn kinds(reg: &BlockRegistry) -> Vec<BlockKind> {
    reg.blocks().iter().map(|b| b.kind).collect()
}

#[test]
fn heading_then_paragraph_across_two_calls() {
    let s = splitter();
    let r1 = s.process_new_content(&BlockRegistry::new(), "# Hello\n\n");
    assert_eq!(kinds(&r1), vec![BlockKind::Heading]);
    let hash = r1.blocks()[0].content_hash;

    let r2 = s.process_new_content(&r1, "# Hello\n\nWorld\n\n");
    assert_eq!(kinds(&r2), vec![BlockKind::Heading, BlockKind::Paragraph]);
    assert_eq!(r2.blocks()[0].content_hash, hash);
    assert_eq!(r2.blocks()[1].content, "World\n\n");
    assert_eq!(r2.blocks_since(&r1).len(), 1);
}

#[test]
fn two_paragraphs_split_on_blank_lines() {
    let reg = splitter().process_new_content(
        &BlockRegistry::new(),
        "First paragraph\n\nSecond paragraph\n\n",
    );
    let contents: Vec<&str> = reg.blocks().iter().map(|b| b.content.as_str()).collect();
    assert_eq!(contents, vec!["First paragraph\n\n", "Second paragraph\n\n"]);
    assert!(reg.active_block().is_none());
}

#[rstest]
#[case::atx("## Sub\nrest", BlockKind::Heading, "## Sub\n")]
#[case::setext("Title\n---\nrest", BlockKind::Heading, "Title\n---\n")]
#[case::thematic("- - -\nrest", BlockKind::HorizontalRule, "- - -\n")]
#[case::fence("~~~\na\n\nb\n~~~\nrest", BlockKind::CodeBlock, "~~~\na\n\nb\n~~~\n")]
#[case::list("- a\n- b\n\nrest", BlockKind::List, "- a\n- b\n\n")]
#[case::quote("> a\n> b\n\nrest", BlockKind::Blockquote, "> a\n> b\n\n")]
#[case::table("| A | B |\n|---|---|\n| 1 | 2 |\n\nrest", BlockKind::Table, "| A | B |\n|---|---|\n| 1 | 2 |\n\n")]
#[case::image("![logo](/logo.png)\n\nrest", BlockKind::Image, "![logo](/logo.png)\n\n")]
fn commits_first_block(#[case] input: &str, #[case] kind: BlockKind, #[case] content: &str) {
    let reg = splitter().process_new_content(&BlockRegistry::new(), input);
    assert_eq!(reg.blocks().len(), 1, "input={input:?}");
    assert_eq!(reg.blocks()[0].kind, kind);
    assert_eq!(reg.blocks()[0].content, content);
    assert_eq!(reg.active_block().map(|a| a.content()), Some("rest"));
}

#[test]
fn heading_interrupts_paragraph_and_list() {
    let reg = splitter().split_all("para\n# H\n- item\n## H2\n");
    assert_eq!(
        kinds(&reg),
        vec![
            BlockKind::Paragraph,
            BlockKind::Heading,
            BlockKind::List,
            BlockKind::Heading
        ]
    );
}

#[test]
fn list_keeps_nested_content_and_lazy_lines() {
    let reg = splitter().split_all("1. one\n   - nested\n   ```\n   code\n   ```\n2. two\nlazy\n");
    assert_eq!(kinds(&reg), vec![BlockKind::List]);
    match &reg.blocks()[0].meta {
        BlockMeta::List {
            ordered,
            start,
            items,
        } => {
            assert!(*ordered);
            assert_eq!(*start, Some(1));
            assert_eq!(items.len(), 2);
        }
        other => panic!("unexpected meta {other:?}"),
    }
}

#[test]
fn ordered_list_not_starting_at_one_does_not_interrupt_paragraph() {
    let reg = splitter().split_all("The year\n1999. was fine\n");
    assert_eq!(kinds(&reg), vec![BlockKind::Paragraph]);
}

#[test]
fn table_metadata_is_attached() {
    let reg = splitter().split_all("| a | b |\n|:--|--:|\n| 1 | 2 |\n| 3 | 4 |\n");
    match &reg.blocks()[0].meta {
        BlockMeta::Table {
            headers,
            alignments,
            rows,
        } => {
            assert_eq!(headers, &vec!["a".to_string(), "b".to_string()]);
            assert_eq!(alignments.len(), 2);
            assert_eq!(rows.len(), 2);
        }
        other => panic!("unexpected meta {other:?}"),
    }
}

#[test]
fn whitespace_only_input_emits_nothing() {
    let s = splitter();
    let reg = s.process_new_content(&BlockRegistry::new(), "\n\n   \n");
    assert!(reg.is_empty());
    let reg = s.finalize_active_block(&reg);
    assert!(reg.blocks().is_empty());
}

#[test]
fn reset_registry_starts_over() {
    let s = splitter();
    let reg = s.split_all("a\n\nb\n");
    assert_eq!(reg.blocks().len(), 2);
    let fresh = s.reset_registry();
    assert!(fresh.is_empty());
    assert_eq!(fresh.cursor(), 0);
    assert_eq!(fresh.block_counter(), 0);
}

#[test]
fn unchanged_text_is_a_no_op() {
    let s = splitter();
    let r1 = s.process_new_content(&BlockRegistry::new(), "a\n\nb");
    let r2 = s.process_new_content(&r1, "a\n\nb");
    assert_eq!(r2.cursor(), r1.cursor());
    assert!(r2.blocks_since(&r1).is_empty());
    assert_eq!(r2.active_block(), r1.active_block());
}
