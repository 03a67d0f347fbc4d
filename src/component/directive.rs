use serde_json::{Map, Value};
use tracing::trace;

use super::registry::ComponentRegistry;
use super::repair::{JsonCleanupReport, repair_props};
use super::{Classification, ComponentInstance};
use crate::syntax::{is_code_fence_closing_line, parse_code_fence_header};

/// Byte range of one directive inside a text. `end` is exclusive; an unclosed directive runs to
/// the end of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveSpan {
    pub start: usize,
    pub end: usize,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentData {
    /// `None` while the name is still streaming.
    pub name: Option<String>,
    pub props: Map<String, Value>,
    pub classification: Classification,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The input with every directive replaced by its marker.
    pub markdown: String,
    pub components: Vec<ComponentInstance>,
    /// Report of the last props repair performed during this pass.
    pub last_cleanup: Option<JsonCleanupReport>,
}

pub fn component_marker(id: &str) -> String {
    format!("<!--component:{id}-->")
}

fn opens_directive(rest: &str) -> bool {
    rest.starts_with("[{c:") || rest.starts_with("[{\"c\":")
}

/// End of the directive opening at `start`, counting braces outside JSON strings.
pub(crate) fn directive_end(text: &str, start: usize) -> (usize, bool) {
    let body = start + 2;
    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    for (rel, c) in text[body..].char_indices() {
        let idx = body + rel;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ']' if depth > 0 => depth -= 1,
            ']' => return (idx + 1, true),
            // Balanced braces without `]` end at the next non-blank character or at the end of
            // the line, whichever comes first.
            '\n' if depth == 0 => return (idx, true),
            c if depth == 0 && !c.is_whitespace() => return (idx, true),
            _ => {}
        }
    }
    (text.len(), false)
}

/// Locate directives outside fenced code.
pub fn find_directives(text: &str) -> Vec<DirectiveSpan> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut at_line_start = true;
    let mut i = 0usize;

    while i < text.len() {
        if at_line_start {
            let line_end = text[i..].find('\n').map_or(text.len(), |rel| i + rel);
            let line = &text[i..line_end];
            if let Some((fence_char, fence_len)) = fence {
                if is_code_fence_closing_line(line, fence_char, fence_len) {
                    fence = None;
                }
                i = line_end + 1;
                continue;
            }
            if let Some(header) = parse_code_fence_header(line) {
                fence = Some((header.fence_char, header.fence_len));
                i = line_end + 1;
                continue;
            }
            at_line_start = false;
        }

        let Some(rel) = text[i..].find(['[', '\n']) else {
            break;
        };
        let at = i + rel;
        if bytes[at] == b'\n' {
            at_line_start = true;
            i = at + 1;
        } else if opens_directive(&text[at..]) {
            let (end, closed) = directive_end(text, at);
            spans.push(DirectiveSpan {
                start: at,
                end,
                closed,
            });
            i = end;
        } else {
            i = at + 1;
        }
    }
    spans
}

struct Cursor<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        let rest = &self.s[self.i..];
        self.i += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, lit: &str) -> bool {
        if self.s[self.i..].starts_with(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    /// Bare (`c`) or quoted (`"c"`) key.
    fn key(&mut self, name: &str) -> bool {
        let quoted = format!("\"{name}\"");
        self.eat(&quoted) || self.eat(name)
    }

    fn peek(&self) -> Option<u8> {
        self.s.as_bytes().get(self.i).copied()
    }

    /// A complete string literal, decoded. `None` if the closing quote has not arrived.
    fn string(&mut self) -> Option<String> {
        if self.peek() != Some(b'"') {
            return None;
        }
        let bytes = self.s.as_bytes();
        let mut escaped = false;
        let mut end = None;
        for (rel, &b) in bytes[self.i + 1..].iter().enumerate() {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                end = Some(self.i + 1 + rel + 1);
                break;
            }
        }
        let end = end?;
        let literal = &self.s[self.i..end];
        self.i = end;
        Some(
            serde_json::from_str::<String>(literal)
                .unwrap_or_else(|_| literal[1..literal.len() - 1].to_string()),
        )
    }

    /// The object starting here, through its matching brace or the end of input.
    fn object_text(&mut self) -> &'a str {
        let start = self.i;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (rel, c) in self.s[start..].char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.i = start + rel + 1;
                        return &self.s[start..self.i];
                    }
                }
                _ => {}
            }
        }
        self.i = self.s.len();
        &self.s[start..]
    }
}

pub fn extract_component_data(fragment: &str) -> ComponentData {
    extract_component_data_with_report(fragment).0
}

/// Parse one directive fragment (starting at `[{`), returning the props repair report when a
/// props object was present.
pub fn extract_component_data_with_report(
    fragment: &str,
) -> (ComponentData, Option<JsonCleanupReport>) {
    let mut data = ComponentData {
        name: None,
        props: Map::new(),
        classification: Classification::Empty,
        closed: false,
    };
    let mut cur = Cursor {
        s: fragment.trim_start(),
        i: 0,
    };

    if !cur.eat("[{") {
        return (data, None);
    }
    cur.skip_ws();
    if !cur.key("c") {
        return (data, None);
    }
    cur.skip_ws();
    if !cur.eat(":") {
        return (data, None);
    }
    cur.skip_ws();
    match cur.string() {
        Some(name) if !name.is_empty() => data.name = Some(name),
        _ => return (data, None),
    }

    let mut report = None;
    cur.skip_ws();
    if cur.eat(",") {
        cur.skip_ws();
        if cur.key("p") {
            cur.skip_ws();
            if cur.eat(":") {
                cur.skip_ws();
                if cur.peek() == Some(b'{') {
                    let repaired = repair_props(cur.object_text());
                    data.props = repaired.props;
                    report = Some(repaired.report);
                }
            }
        }
    }

    cur.skip_ws();
    data.closed = cur.eat("}") && {
        cur.skip_ws();
        cur.eat("]")
    };
    data.classification = if data.props.is_empty() {
        Classification::Empty
    } else if data.closed && report.as_ref().is_none_or(|r| r.outcome.is_faithful()) {
        Classification::Complete
    } else {
        Classification::Partial
    };
    (data, report)
}

/// Replace every directive in `text` with its marker and collect the component instances.
///
/// `base_offset` is the position of `text` in the full stream; it makes instance ids stable
/// across passes. Directives whose name has not finished streaming are removed without a marker.
pub fn extract_components(
    text: &str,
    base_offset: usize,
    registry: Option<&dyn ComponentRegistry>,
) -> Extraction {
    let spans = find_directives(text);
    if spans.is_empty() {
        return Extraction {
            markdown: text.to_string(),
            components: Vec::new(),
            last_cleanup: None,
        };
    }

    let mut markdown = String::with_capacity(text.len());
    let mut components = Vec::with_capacity(spans.len());
    let mut last_cleanup = None;
    let mut copied = 0usize;

    for span in &spans {
        markdown.push_str(&text[copied..span.start]);
        copied = span.end;

        let (data, report) = extract_component_data_with_report(&text[span.start..span.end]);
        if report.is_some() {
            last_cleanup = report;
        }
        let Some(name) = data.name else {
            continue;
        };
        let id = format!("{name}@{}", base_offset + span.start);
        markdown.push_str(&component_marker(&id));
        components.push(ComponentInstance {
            resolved: registry.is_none_or(|r| r.has(&name)),
            id,
            name,
            props: data.props,
            classification: data.classification,
        });
    }
    markdown.push_str(&text[copied..]);

    trace!(
        directives = spans.len(),
        components = components.len(),
        "extracted components"
    );
    Extraction {
        markdown,
        components,
        last_cleanup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentDefinition, Components};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::complete(r#"[{c:"Card",p:{"title":"Hello"}}]"#, Some("Card"), json!({"title": "Hello"}), Classification::Complete)]
    #[case::quoted_keys(r#"[{"c":"Card","p":{"n":1}}]"#, Some("Card"), json!({"n": 1}), Classification::Complete)]
    #[case::open_string(r#"[{c:"Card",p:{"title":"Hel"#, Some("Card"), json!({}), Classification::Empty)]
    #[case::open_props(r#"[{c:"Card",p:{"title":"Hello","#, Some("Card"), json!({"title": "Hello"}), Classification::Partial)]
    #[case::no_props(r#"[{c:"Divider"}]"#, Some("Divider"), json!({}), Classification::Empty)]
    #[case::name_streaming(r#"[{c:"Ca"#, None, json!({}), Classification::Empty)]
    #[case::escaped_name(r#"[{c:"A\"B"}]"#, Some("A\"B"), json!({}), Classification::Empty)]
    fn component_data(
        #[case] fragment: &str,
        #[case] name: Option<&str>,
        #[case] props: Value,
        #[case] classification: Classification,
    ) {
        let data = extract_component_data(fragment);
        assert_eq!(data.name.as_deref(), name);
        assert_eq!(Value::Object(data.props), props);
        assert_eq!(data.classification, classification);
    }

    #[test]
    fn extraction_replaces_directives_with_markers() {
        let text = "Before [{c:\"Chip\",p:{\"x\":1}}] after\n";
        let ex = extract_components(text, 10, None);
        assert_eq!(ex.markdown, "Before <!--component:Chip@17--> after\n");
        assert_eq!(ex.components.len(), 1);
        assert_eq!(ex.components[0].id, "Chip@17");
        assert!(ex.components[0].resolved);
        assert_eq!(ex.last_cleanup.map(|r| r.outcome), Some(crate::component::RepairTier::Strict));
    }

    #[test]
    fn streaming_name_leaves_no_marker() {
        let ex = extract_components("Hi [{c:\"Ca", 0, None);
        assert_eq!(ex.markdown, "Hi ");
        assert!(ex.components.is_empty());
    }

    #[test]
    fn unknown_names_are_unresolved() {
        let reg = Components::new().with(ComponentDefinition::new("Card"));
        let ex = extract_components("[{c:\"Card\"}]\n[{c:\"Other\"}]", 0, Some(&reg));
        let resolved: Vec<_> = ex.components.iter().map(|c| (c.name.as_str(), c.resolved)).collect();
        assert_eq!(resolved, vec![("Card", true), ("Other", false)]);
    }

    #[test]
    fn directives_inside_fences_are_left_alone() {
        let text = "```\n[{c:\"Card\"}]\n```\n";
        assert!(find_directives(text).is_empty());
    }

    #[test]
    fn spans_report_closure() {
        let spans = find_directives("a [{c:\"X\",p:{\"k\":\"]}\"}}] b [{c:\"Y\"");
        assert_eq!(spans.len(), 2);
        assert!(spans[0].closed);
        assert!(!spans[1].closed);
        assert_eq!(spans[1].end, "a [{c:\"X\",p:{\"k\":\"]}\"}}] b [{c:\"Y\"".len());
    }

    #[test]
    fn balanced_directive_without_bracket_ends_with_its_line() {
        let line = "[{c:\"Card\",p:{\"t\":1}}";
        assert_eq!(directive_end(&format!("{line}\nHello"), 0), (line.len(), true));
        assert_eq!(directive_end(&format!("{line}  \n"), 0), (line.len() + 2, true));
        // Nothing after the braces yet: still open.
        assert_eq!(directive_end(line, 0), (line.len(), false));

        let spans = find_directives(&format!("{line}\nHello\n"));
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].end, spans[0].closed), (line.len(), true));
    }
}
