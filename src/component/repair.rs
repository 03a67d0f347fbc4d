use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTier {
    Strict,
    BraceBalanced,
    SafePrefix,
    Empty,
}

impl RepairTier {
    /// Tiers that keep every member the producer wrote.
    pub fn is_faithful(self) -> bool {
        matches!(self, RepairTier::Strict | RepairTier::BraceBalanced)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CleanupError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<serde_json::Error> for CleanupError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

impl CleanupError {
    fn not_an_object() -> Self {
        Self {
            message: "props must be a JSON object".to_string(),
            line: 1,
            column: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupStep {
    pub tier: RepairTier,
    pub candidate: String,
    #[serde(skip)]
    pub error: Option<CleanupError>,
}

/// What happened to the most recent props text, tier by tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonCleanupReport {
    pub original: String,
    pub steps: Vec<CleanupStep>,
    pub final_text: String,
    pub outcome: RepairTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairedProps {
    pub props: Map<String, Value>,
    pub report: JsonCleanupReport,
}

fn parse_object(candidate: &str) -> Result<Map<String, Value>, CleanupError> {
    match serde_json::from_str::<Value>(candidate)? {
        Value::Object(map) => Ok(map),
        _ => Err(CleanupError::not_an_object()),
    }
}

/// Recover a props object from possibly truncated JSON. Never fails: the last tier is an empty
/// map.
pub fn repair_props(text: &str) -> RepairedProps {
    let mut steps = Vec::new();
    let mut attempt = |tier: RepairTier, candidate: String| -> Option<(Map<String, Value>, String)> {
        match parse_object(&candidate) {
            Ok(map) => {
                steps.push(CleanupStep {
                    tier,
                    candidate: candidate.clone(),
                    error: None,
                });
                Some((map, candidate))
            }
            Err(err) => {
                steps.push(CleanupStep {
                    tier,
                    candidate,
                    error: Some(err),
                });
                None
            }
        }
    };

    let mut result = attempt(RepairTier::Strict, text.to_string()).map(|r| (RepairTier::Strict, r));
    if result.is_none() {
        let balanced = balance_braces(text);
        if balanced != text {
            result = attempt(RepairTier::BraceBalanced, balanced).map(|r| (RepairTier::BraceBalanced, r));
        }
    }
    if result.is_none() {
        if let Some(prefix) = safe_prefix(text) {
            result = attempt(RepairTier::SafePrefix, prefix).map(|r| (RepairTier::SafePrefix, r));
        }
    }

    let (outcome, (props, final_text)) =
        result.unwrap_or_else(|| (RepairTier::Empty, (Map::new(), "{}".to_string())));
    if outcome != RepairTier::Strict {
        debug!(tier = ?outcome, input_len = text.len(), "repaired component props");
    }

    RepairedProps {
        props,
        report: JsonCleanupReport {
            original: text.to_string(),
            steps,
            final_text,
            outcome,
        },
    }
}

/// Append `}` for every `{` left open outside string literals.
pub fn balance_braces(text: &str) -> String {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
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
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    let mut out = String::with_capacity(text.len() + depth);
    out.push_str(text);
    out.extend(std::iter::repeat_n('}', depth));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrEnd,
    KeyOrEnd,
    Colon,
    CommaOrEnd,
}

/// Cut `text` back to its last complete member and close whatever containers are still open.
///
/// Trailing commas and keys without a value are dropped. Returns `None` when not even the
/// opening of a value survives.
pub fn safe_prefix(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut closers: Vec<u8> = Vec::new();
    let mut expect = Expect::Value;
    let mut pending_comma = false;
    let mut checkpoint: Option<(usize, Vec<u8>)> = None;
    let mut i = 0usize;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let Some(&b) = bytes.get(i) else {
            break;
        };

        let mut completed = false;
        match expect {
            Expect::Value | Expect::ValueOrEnd => match b {
                b']' if expect == Expect::ValueOrEnd && closers.last() == Some(&b']') => {
                    closers.pop();
                    pending_comma = false;
                    out.push(']');
                    i += 1;
                    completed = true;
                }
                b'{' | b'[' => {
                    if pending_comma {
                        out.push(',');
                        pending_comma = false;
                    }
                    out.push(b as char);
                    if b == b'{' {
                        closers.push(b'}');
                        expect = Expect::KeyOrEnd;
                    } else {
                        closers.push(b']');
                        expect = Expect::ValueOrEnd;
                    }
                    i += 1;
                    checkpoint = Some((out.len(), closers.clone()));
                }
                b'"' => {
                    let Some(end) = string_end(bytes, i) else {
                        break;
                    };
                    if pending_comma {
                        out.push(',');
                        pending_comma = false;
                    }
                    out.push_str(&text[i..end]);
                    i = end;
                    completed = true;
                }
                _ => {
                    let end = bytes[i..]
                        .iter()
                        .position(|b| matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace())
                        .map(|rel| i + rel);
                    // A scalar running into the end of input may still grow (`tru`, `12`).
                    let Some(end) = end else {
                        break;
                    };
                    let token = &text[i..end];
                    if serde_json::from_str::<Value>(token).is_err() {
                        break;
                    }
                    if pending_comma {
                        out.push(',');
                        pending_comma = false;
                    }
                    out.push_str(token);
                    i = end;
                    completed = true;
                }
            },
            Expect::KeyOrEnd => match b {
                b'}' => {
                    closers.pop();
                    pending_comma = false;
                    out.push('}');
                    i += 1;
                    completed = true;
                }
                b'"' => {
                    let Some(end) = string_end(bytes, i) else {
                        break;
                    };
                    if pending_comma {
                        out.push(',');
                        pending_comma = false;
                    }
                    out.push_str(&text[i..end]);
                    i = end;
                    expect = Expect::Colon;
                }
                _ => break,
            },
            Expect::Colon => {
                if b != b':' {
                    break;
                }
                out.push(':');
                i += 1;
                expect = Expect::Value;
            }
            Expect::CommaOrEnd => match b {
                b',' => {
                    pending_comma = true;
                    i += 1;
                    expect = if closers.last() == Some(&b'}') {
                        Expect::KeyOrEnd
                    } else {
                        Expect::ValueOrEnd
                    };
                }
                b'}' | b']' if closers.last() == Some(&b) => {
                    closers.pop();
                    out.push(b as char);
                    i += 1;
                    completed = true;
                }
                _ => break,
            },
        }

        if completed {
            checkpoint = Some((out.len(), closers.clone()));
            if closers.is_empty() {
                break;
            }
            expect = Expect::CommaOrEnd;
        }
    }

    let (len, open) = checkpoint?;
    out.truncate(len);
    out.extend(open.iter().rev().map(|&b| b as char));
    Some(out)
}

/// Index one past the closing quote of the string starting at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut escaped = false;
    for (rel, &b) in bytes[start + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(start + 1 + rel + 1);
        }
    }
    None
}
