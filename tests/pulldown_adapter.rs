#![cfg(feature = "pulldown")]

use markstream::adapters::pulldown::{PulldownParser, PulldownParserOptions};
use markstream::{BlockParser, BlockRegistry, NodeKind, Options, Splitter};
use pretty_assertions::assert_eq;
use pulldown_cmark::Options as PulldownOptions;

#[test]
fn stable_blocks_carry_parsed_trees() {
    let s = Splitter::new(Options::default());
    let reg = s.process_new_content(&BlockRegistry::new(), "## Title\n\nSome **bold** text.\n\n");
    let heading = reg.blocks()[0].ast.as_ref().map(|n| n.kind.clone());
    assert_eq!(heading, Some(NodeKind::Heading { level: 2 }));

    let para = reg.blocks()[1].ast.as_ref();
    assert!(para.is_some_and(|n| n.find(|c| c.kind == NodeKind::Strong).is_some()));
    assert_eq!(para.map(|n| n.text_content()), Some("Some bold text.".to_string()));
}

#[test]
fn active_display_parses_as_closed_markup() {
    let s = Splitter::new(Options::default());
    let reg = s.process_new_content(&BlockRegistry::new(), "Hello\n\n**bold");
    let tree = reg
        .active_block()
        .and_then(|a| a.parse_display(s.parser()));
    assert!(tree.is_some_and(|n| n.find(|c| c.kind == NodeKind::Strong).is_some()));
}

#[test]
fn component_markers_survive_parsing() {
    let s = Splitter::new(Options::default());
    let reg = s.split_all("Price: [{c:\"Price\",p:{\"v\":1}}] only\n");
    let ast = reg.blocks()[0].ast.as_ref();
    assert!(ast.is_some_and(|n| n
        .find(|c| c.kind == NodeKind::Component { id: "Price@7".into() })
        .is_some()));
}

#[test]
fn parsing_can_be_disabled() {
    let s = Splitter::new(Options {
        parse_stable_blocks: false,
        ..Options::default()
    });
    let reg = s.split_all("plain\n");
    assert!(reg.blocks()[0].ast.is_none());
}

#[test]
fn custom_options_turn_off_tables() {
    let parser = PulldownParser::new(PulldownParserOptions {
        pulldown: PulldownOptions::empty(),
        autolinks: false,
    });
    let doc = parser.parse_document("| a |\n|---|\n| 1 |\n");
    assert!(doc.find(|n| matches!(n.kind, NodeKind::Table { .. })).is_none());
    assert!(parser.is_valid_markdown("# ok"));
}
