mod support;

use markstream::component::RepairTier;
use markstream::{
    BlockKind, BlockRegistry, Classification, ComponentDefinition, Components, Options, Splitter,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::*;

const CARD: &str = "[{c:\"Card\",p:{\"title\":\"Hello\",\"tags\":[\"a\",\"b\"]}}]\n";

#[test]
fn streamed_directive_grows_from_empty_to_complete() {
    let s = Splitter::plain_text(Options::default());
    let snapshots = stream(&s, chunk_chars(CARD));

    let mut seen = Vec::new();
    for reg in &snapshots {
        if let Some(active) = reg.active_block() {
            assert_eq!(active.kind(), BlockKind::Component);
            assert!(!active.display().contains("[{"), "display={:?}", active.display());
            if let Some(c) = active.components().first() {
                if seen.last() != Some(&c.classification) {
                    seen.push(c.classification);
                }
            }
        }
    }
    assert_eq!(seen.first(), Some(&Classification::Empty));
    assert!(seen.contains(&Classification::Partial));

    let last = snapshots.last().map(|r| r.blocks().to_vec()).unwrap_or_default();
    assert_eq!(last.len(), 1);
    let card = last[0].component().cloned();
    assert_eq!(card.as_ref().map(|c| c.classification), Some(Classification::Complete));
    assert_eq!(
        card.map(|c| serde_json::Value::Object(c.props)),
        Some(json!({"title": "Hello", "tags": ["a", "b"]}))
    );
}

#[test]
fn partial_props_report_the_repair_tier() {
    let s = Splitter::plain_text(Options::default());
    let reg = s.process_new_content(&BlockRegistry::new(), "[{c:\"Card\",p:{\"title\":\"Hello\",\"n\":");
    let active = reg.active_block().cloned();
    let report = active.as_ref().and_then(|a| a.last_cleanup().cloned());
    let report = report.map(|r| r.outcome);
    assert!(matches!(report, Some(RepairTier::SafePrefix)), "{report:?}");
    let props = active.and_then(|a| a.components().first().map(|c| c.props.clone()));
    assert_eq!(props.map(serde_json::Value::Object), Some(json!({"title": "Hello"})));
}

#[test]
fn inline_directive_stays_in_paragraph() {
    let s = Splitter::plain_text(Options::default());
    let reg = s.split_all("Buy now [{c:\"Price\",p:{\"amount\":5}}] today.\n");
    assert_eq!(reg.blocks().len(), 1);
    let block = &reg.blocks()[0];
    assert_eq!(block.kind, BlockKind::Paragraph);
    assert_eq!(block.components.len(), 1);
    assert_eq!(block.components[0].name, "Price");
    assert_eq!(block.components[0].id, "Price@8");
}

#[test]
fn unknown_components_are_flagged_unresolved() {
    let registry = Components::new().with(ComponentDefinition::new("Card").require("title"));
    let s = Splitter::plain_text(Options::default()).with_components(registry);
    let reg = s.split_all("[{c:\"Card\",p:{\"title\":\"x\"}}]\n\n[{c:\"Chart\",p:{}}]\n");
    let resolved: Vec<(String, bool)> = reg
        .blocks()
        .iter()
        .filter_map(|b| b.component())
        .map(|c| (c.name.clone(), c.resolved))
        .collect();
    assert_eq!(resolved, vec![("Card".to_string(), true), ("Chart".to_string(), false)]);
}

#[test]
fn directives_inside_code_are_left_alone() {
    let s = Splitter::plain_text(Options::default());
    let reg = s.split_all("```\n[{c:\"Card\",p:{}}]\n```\n");
    assert_eq!(reg.blocks()[0].kind, BlockKind::CodeBlock);
    assert!(reg.blocks()[0].components.is_empty());
}

#[test]
fn disabled_components_are_plain_text() {
    let s = Splitter::plain_text(Options {
        components: false,
        ..Options::default()
    });
    let reg = s.split_all("[{c:\"Card\",p:{}}]\n");
    assert_eq!(reg.blocks()[0].kind, BlockKind::Paragraph);
    assert!(reg.blocks()[0].components.is_empty());
}
