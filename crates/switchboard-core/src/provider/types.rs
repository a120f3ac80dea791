//! Types shared across all provider adapters.
//!
//! These define the contract between the gateway entry point and the
//! family-specific wire code: normalized call parameters go in, a
//! `NormalizedResponse` comes out, whichever provider served the call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key-value map describing one request.
///
/// The gateway never mutates the caller's copy; adapters build derived,
/// provider-specific copies.
pub type CallParams = Map<String, Value>;

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

/// Extract the `messages` list from call parameters, tolerating both
/// string-only and structured entries.
pub fn messages_from_params(params: &CallParams) -> Vec<ChatMessage> {
    params
        .get("messages")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|m| {
                    let role = m.get("role")?.as_str()?.to_string();
                    let content = m.get("content")?.as_str()?.to_string();
                    Some(ChatMessage { role, content })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One tool invocation recorded during an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUse {
    pub name: String,
    pub arguments: Value,
    pub step: u32,
}

/// Normalized chat-style response content.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub role: String,
    pub content: String,
    /// The model that actually served the request (which may differ from
    /// the requested alias when agent mode substituted a capable default).
    pub model: String,
    pub usage: Usage,
    /// Parsed JSON when the content text itself is valid JSON.
    pub structured_output: Option<Value>,
    /// Signals downstream sanitization to keep the content verbatim
    /// instead of re-extracting a sub-field.
    pub preserve_structure: bool,
    /// Ordered trace of tools executed during an agent run.
    pub tools_used: Vec<ToolUse>,
}

/// The gateway's single internal response shape.
#[derive(Debug, Clone)]
pub enum NormalizedResponse {
    /// Text content with role/model/usage.
    Chat(ChatResponse),
    /// Embedding responses pass through unchanged.
    Passthrough(Value),
    /// Binary audio from a text-to-speech call.
    Audio { audio_base64: String, content_type: String },
    /// Plain-text transcription subtypes (`srt`, `vtt`, `text`).
    Transcript { text: String, format: String },
}

impl NormalizedResponse {
    /// Convenience accessor for text content, used by the agent loop.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Chat(c) => Some(&c.content),
            _ => None,
        }
    }
}
