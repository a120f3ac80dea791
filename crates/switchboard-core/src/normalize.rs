//! Response normalization.
//!
//! Pure mapping from each provider family's native response shape into the
//! gateway's single `NormalizedResponse`. Dispatch is on the model family,
//! never a runtime type. Non-chat modalities pass through untouched.

use base64::Engine;
use serde_json::Value;

use crate::error::Result;
use crate::provider::types::{ChatResponse, NormalizedResponse, Usage};
use crate::provider::RawResponse;
use crate::registry::ProviderFamily;

/// Normalize one provider-native response.
pub fn normalize(raw: RawResponse, family: ProviderFamily, alias: &str) -> Result<NormalizedResponse> {
    match raw {
        RawResponse::Audio { bytes, content_type } => Ok(NormalizedResponse::Audio {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            content_type,
        }),
        RawResponse::Text { body, format } => {
            Ok(NormalizedResponse::Transcript { text: body, format })
        }
        RawResponse::Json(value) => match family {
            ProviderFamily::Chat | ProviderFamily::Reasoning => {
                Ok(NormalizedResponse::Chat(normalize_chat(&value, alias)))
            }
            ProviderFamily::Claude => Ok(NormalizedResponse::Chat(normalize_claude(&value, alias))),
            ProviderFamily::Gemini => Ok(NormalizedResponse::Chat(normalize_gemini(&value, alias))),
            // Embeddings and JSON-format transcriptions carry their own
            // shape; pass through unchanged.
            ProviderFamily::Embedding | ProviderFamily::Transcription | ProviderFamily::Speech => {
                Ok(NormalizedResponse::Passthrough(value))
            }
        },
    }
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = match key.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(*key)?,
        };
    }
    current.as_str()
}

fn u32_at(value: &Value, path: &[&str]) -> u32 {
    let mut current = value;
    for key in path {
        current = match key.parse::<usize>() {
            Ok(index) => match current.get(index) {
                Some(v) => v,
                None => return 0,
            },
            Err(_) => match current.get(*key) {
                Some(v) => v,
                None => return 0,
            },
        };
    }
    current.as_u64().unwrap_or(0) as u32
}

/// Recompute the total additively when the provider reports separate
/// prompt/completion counts but no total.
fn finish_usage(mut usage: Usage) -> Usage {
    if usage.total_tokens == 0 {
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
    }
    usage
}

/// Attach parsed JSON when the content text itself is a JSON structure.
fn attach_structured_output(response: &mut ChatResponse) {
    let trimmed = response.content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
        response.structured_output = Some(parsed);
        response.preserve_structure = true;
    }
}

fn normalize_chat(value: &Value, alias: &str) -> ChatResponse {
    let mut response = ChatResponse {
        content: str_at(value, &["choices", "0", "message", "content"])
            .unwrap_or_default()
            .to_string(),
        role: str_at(value, &["choices", "0", "message", "role"])
            .unwrap_or("assistant")
            .to_string(),
        model: str_at(value, &["model"]).unwrap_or(alias).to_string(),
        usage: finish_usage(Usage {
            prompt_tokens: u32_at(value, &["usage", "prompt_tokens"]),
            completion_tokens: u32_at(value, &["usage", "completion_tokens"]),
            total_tokens: u32_at(value, &["usage", "total_tokens"]),
        }),
        ..ChatResponse::default()
    };
    attach_structured_output(&mut response);
    response
}

fn normalize_claude(value: &Value, alias: &str) -> ChatResponse {
    let prompt_tokens = u32_at(value, &["usage", "input_tokens"]);
    let completion_tokens = u32_at(value, &["usage", "output_tokens"]);
    let mut response = ChatResponse {
        content: str_at(value, &["content", "0", "text"]).unwrap_or_default().to_string(),
        role: str_at(value, &["role"]).unwrap_or("assistant").to_string(),
        model: str_at(value, &["model"]).unwrap_or(alias).to_string(),
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
        ..ChatResponse::default()
    };
    attach_structured_output(&mut response);
    response
}

/// Gemini responses arrive either as a single object or a chunk array;
/// text parts are collected across every candidate and joined with spaces,
/// and usage comes from the final chunk.
fn normalize_gemini(value: &Value, alias: &str) -> ChatResponse {
    let single = std::slice::from_ref(value);
    let chunks: &[Value] = match value.as_array() {
        Some(list) => list.as_slice(),
        None => single,
    };

    let mut parts: Vec<String> = Vec::new();
    for chunk in chunks {
        if let Some(candidates) = chunk
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
        {
            for part in candidates {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        parts.push(text.to_string());
                    }
                }
            }
        }
    }

    let last = chunks.last().cloned().unwrap_or(Value::Null);
    let mut response = ChatResponse {
        content: parts.join(" "),
        role: "assistant".to_string(),
        model: chunks
            .first()
            .and_then(|c| str_at(c, &["modelVersion"]))
            .unwrap_or(alias)
            .to_string(),
        usage: finish_usage(Usage {
            prompt_tokens: u32_at(&last, &["usageMetadata", "promptTokenCount"]),
            completion_tokens: u32_at(&last, &["usageMetadata", "candidatesTokenCount"]),
            total_tokens: u32_at(&last, &["usageMetadata", "totalTokenCount"]),
        }),
        ..ChatResponse::default()
    };
    attach_structured_output(&mut response);
    response
}
