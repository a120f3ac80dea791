//! Decoding of router-protocol model output.
//!
//! Models in agent mode are asked to answer with a single JSON object
//! carrying either `tool_call` or `final_answer`. Real model output is
//! messier: pretty-printed JSON with raw control characters inside
//! strings, HTML entities, fenced code blocks, or prose wrapped around
//! the object. The pipeline is strict parse first, then a bounded regex
//! rescue, then graceful degradation to a plain-text final answer.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// What the model asked for this step.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    ToolCall { name: String, arguments: Map<String, Value> },
    FinalAnswer(String),
    /// Output that never decoded as protocol JSON; treated as a final
    /// natural-language answer, not an error.
    Raw(String),
}

/// Replace embedded control characters that break strict JSON parsing.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\t' => ' ',
            _ => c,
        })
        .filter(|c| *c != '\r')
        .collect()
}

fn tool_call_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)\{.*"tool_call".*\}"#).unwrap())
}

/// Heuristic fallback: extract a `{..."tool_call"...}` fragment out of
/// otherwise malformed output and try to parse just that.
pub fn rescue_tool_call(text: &str) -> Option<Value> {
    let fragment = tool_call_fragment_re().find(text)?.as_str();
    serde_json::from_str(fragment).ok()
}

/// Decode one model turn into a directive.
pub fn decode_directive(text: &str) -> Directive {
    let cleaned = html_escape::decode_html_entities(&strip_control_chars(text)).to_string();

    let parsed = serde_json::from_str::<Value>(cleaned.trim())
        .ok()
        .or_else(|| {
            debug!("Strict decode failed, attempting tool-call rescue");
            rescue_tool_call(&cleaned)
        });

    let Some(value) = parsed else {
        return Directive::Raw(text.to_string());
    };

    if let Some(call) = value.get("tool_call") {
        let name = call
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let arguments = call
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        return Directive::ToolCall { name, arguments };
    }

    if let Some(answer) = value.get("final_answer") {
        let answer = match answer {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Directive::FinalAnswer(answer);
    }

    // Parsed JSON with neither recognized field: never silently drop output.
    Directive::Raw(text.to_string())
}
