//! Output sanitization: the final gate before the caller.
//!
//! Whatever path produced the response — direct call, agent loop, or a
//! typed failure — the caller receives one stable envelope with clean,
//! user-presentable text. Passthrough modalities are detected structurally;
//! this layer has no provider knowledge. Internal error detail never
//! crosses this boundary: each error kind maps to one fixed polite message.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::GatewayError;
use crate::provider::types::{NormalizedResponse, ToolUse, Usage};

/// The only shapes a caller ever sees. A sanitized error shares the text
/// shape with success on purpose, so UIs never special-case failures.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PublicResponse {
    Text {
        role: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tools_used: Vec<ToolUse>,
    },
    Passthrough(Value),
    Audio { audio_base64: String, content_type: String },
    Transcript { text: String, format: String },
}

impl PublicResponse {
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Fixed, user-safe message per error kind. Never echoes internal detail.
fn polite_message(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::UnsupportedModel(_) => {
            "The requested model isn't available right now. Please try a different model."
        }
        GatewayError::MissingRequiredParameter(_) => {
            "Your request is missing information the selected model needs. Please adjust it and try again."
        }
        GatewayError::Network(_) => {
            "I couldn't reach the language model service. Please try again in a moment."
        }
        GatewayError::ResponseDecode(_) => {
            "The language model returned something I couldn't read. Please try again."
        }
        GatewayError::UnknownTool(_) => {
            "I tried to use a capability that isn't configured here. Please contact your administrator."
        }
        GatewayError::MissingParameters { .. } => {
            "I need a bit more information before I can finish that request."
        }
        GatewayError::RemoteTool(_) => {
            "One of the tools I used ran into a problem. Please try again."
        }
        GatewayError::ToolLoopDetected(_) => {
            "I kept repeating the same lookup without making progress, so I stopped. Please rephrase your request."
        }
        GatewayError::MaxToolsExceeded => {
            "That request needed more tool calls than I'm allowed to make in one run."
        }
        GatewayError::Timeout => {
            "That request took too long, so I stopped. Please try again or simplify it."
        }
        GatewayError::AgentMaxStepsExceeded => {
            "I reached my step limit before finishing. Please try a simpler request."
        }
        GatewayError::MisconfiguredTools(_) => {
            "The tools for this project aren't configured correctly. Please contact your administrator."
        }
        GatewayError::UnsupportedToolEndpoint(_) => {
            "One of the configured tools uses an endpoint I can't call. Please contact your administrator."
        }
    }
}

/// Strip a markdown code fence (``` or ```json) wrapped around content.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

/// Pull a user-facing string out of an accidentally leaked structured
/// envelope.
fn extract_envelope_field(value: &Value) -> Option<String> {
    for field in ["final_answer", "content", "message"] {
        if let Some(text) = value.get(field).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

fn partial_final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""final_answer"\s*:\s*"((?:[^"\\]|\\.)*)"#).unwrap())
}

/// Last-resort backstop: upstream truncation can cut a structured answer
/// mid-string, leaving raw JSON syntax in the content. Extract and
/// un-escape the partial string instead of showing it to the user.
pub fn rescue_partial_final_answer(text: &str) -> Option<String> {
    let captured = partial_final_answer_re().captures(text)?.get(1)?.as_str();
    // Re-quote and let the JSON parser handle the escapes; a capture cut
    // mid-escape falls back to the raw fragment.
    match serde_json::from_str::<String>(&format!("\"{captured}\"")) {
        Ok(unescaped) => Some(unescaped),
        Err(_) => Some(captured.to_string()),
    }
}

/// Clean model text for presentation.
fn sanitize_content(content: &str, preserve_structure: bool) -> String {
    let decoded = html_escape::decode_html_entities(content).to_string();
    let stripped = strip_code_fences(&decoded).to_string();

    if !preserve_structure {
        if let Ok(value) = serde_json::from_str::<Value>(stripped.trim()) {
            if let Some(text) = extract_envelope_field(&value) {
                debug!("Extracted user-facing field from leaked structured envelope");
                return text;
            }
        }
        if stripped.contains("{\"final_answer\"") || stripped.contains("{ \"final_answer\"") {
            if let Some(rescued) = rescue_partial_final_answer(&stripped) {
                return rescued;
            }
        }
    }
    stripped
}

/// Map an internal outcome to the public envelope.
pub fn sanitize(outcome: Result<NormalizedResponse, GatewayError>) -> PublicResponse {
    match outcome {
        Ok(NormalizedResponse::Passthrough(value)) => PublicResponse::Passthrough(value),
        Ok(NormalizedResponse::Audio { audio_base64, content_type }) => {
            PublicResponse::Audio { audio_base64, content_type }
        }
        Ok(NormalizedResponse::Transcript { text, format }) => {
            PublicResponse::Transcript { text, format }
        }
        Ok(NormalizedResponse::Chat(chat)) => PublicResponse::Text {
            role: if chat.role.is_empty() { "assistant".into() } else { chat.role },
            content: sanitize_content(&chat.content, chat.preserve_structure),
            model: Some(chat.model),
            usage: Some(chat.usage),
            tools_used: chat.tools_used,
        },
        Err(error) => PublicResponse::Text {
            role: "assistant".into(),
            content: polite_message(&error).to_string(),
            model: None,
            usage: None,
            tools_used: Vec::new(),
        },
    }
}
