//! # Tool-Call Extractor (C3)
//!
//! A pure, deterministic parser that recognizes tool invocations embedded
//! in free-form model output. Four formats are tried in order, stopping at
//! the first that yields at least one call: root JSON (multi-call, then
//! single-call shape), fenced code blocks, and a `Tool:`/`Params:` prose
//! fallback. See SPEC_FULL §4.3 for the exact grammar.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Language tags fenced blocks carry when they are deliberately *not*
/// JSON. A block tagged with one of these is still attempted — see the
/// module doc — the set exists only to document the spec's intent; it
/// never gates whether we try to parse a block, since a failed parse
/// falls through to the next block either way.
const KNOWN_NON_JSON_LANGS: &[&str] = &[
    "yaml", "python", "go", "js", "java", "ruby", "c", "cpp", "csharp", "php", "rust", "shell",
    "bash", "sql", "typescript",
];

/// One `(tool_name, params)` pair recognized in model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCall {
    pub name: String,
    pub params: Value,
}

/// Result of running the extractor over one assistant text.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub calls: Vec<ExtractedCall>,
}

impl ExtractionResult {
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    fn empty() -> Self {
        Self { calls: Vec::new() }
    }
}

/// Extract zero, one, or many tool calls from a single assistant text.
/// Pure and deterministic: identical input always yields identical output.
pub fn extract(text: &str) -> ExtractionResult {
    if let Some(calls) = try_root_json(text) {
        return ExtractionResult { calls };
    }
    if text.contains("```") {
        if let Some(calls) = try_fenced_blocks(text) {
            return ExtractionResult { calls };
        }
    }
    if mentions_prose_keys(text) {
        if let Some(calls) = try_prose(text) {
            return ExtractionResult { calls };
        }
    }
    ExtractionResult::empty()
}

fn mentions_prose_keys(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("tool:") || lower.contains("params:") || lower.contains("parameters:")
}

/// Attempts 1 and 2: root JSON, multi-call shape then single-call shape.
fn try_root_json(text: &str) -> Option<Vec<ExtractedCall>> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    try_multi_call(text).or_else(|| try_single_call(text))
}

/// `{tool_calls: [{function: {name, arguments}}, ...]}`
fn try_multi_call(text: &str) -> Option<Vec<ExtractedCall>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let tool_calls = value.get("tool_calls")?.as_array()?;

    let calls: Vec<ExtractedCall> = tool_calls
        .iter()
        .filter_map(|entry| {
            let function = entry.get("function")?;
            let name = function.get("name").and_then(Value::as_str).unwrap_or("");
            if name.is_empty() {
                return None;
            }
            let params = match function.get("arguments") {
                Some(Value::String(raw)) => {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                }
                Some(other) => other.clone(),
                None => Value::Object(Default::default()),
            };
            Some(ExtractedCall {
                name: name.to_string(),
                params,
            })
        })
        .collect();

    if calls.is_empty() { None } else { Some(calls) }
}

/// `{tool: "<name>", params: <any>}`
fn try_single_call(text: &str) -> Option<Vec<ExtractedCall>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let tool = value.get("tool")?.as_str()?;
    if tool.is_empty() {
        return None;
    }
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    Some(vec![ExtractedCall {
        name: tool.to_string(),
        params,
    }])
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").expect("valid fence regex"))
}

/// Attempt 3: scan every fenced block in order, running attempts 1 and 2
/// on the block body; return the first block that yields ≥ 1 call.
fn try_fenced_blocks(text: &str) -> Option<Vec<ExtractedCall>> {
    for caps in fence_regex().captures_iter(text) {
        let body = caps.get(2)?.as_str();
        if let Some(calls) = try_multi_call(body).or_else(|| try_single_call(body)) {
            return Some(calls);
        }
    }
    None
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes()) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Attempt 4: line-scan for `Tool: <name>` and `Params: <rest>`, where the
/// params value may continue onto subsequent lines until the next `Tool:`.
fn try_prose(text: &str) -> Option<Vec<ExtractedCall>> {
    let mut tool_name: Option<String> = None;
    let mut params_lines: Vec<String> = Vec::new();
    let mut collecting_params = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = strip_prefix_ci(trimmed, "tool:") {
            tool_name = Some(rest.trim().to_string());
            collecting_params = false;
            continue;
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "parameters:")
            .or_else(|| strip_prefix_ci(trimmed, "params:"))
        {
            params_lines.push(rest.trim().to_string());
            collecting_params = true;
            continue;
        }
        if collecting_params {
            params_lines.push(line.to_string());
        }
    }

    let name = tool_name?;
    if name.is_empty() {
        return None;
    }
    let raw = params_lines.join("\n").trim().to_string();
    let params = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    Some(vec![ExtractedCall { name, params }])
}
