//! Claude-style family adapter.
//!
//! The endpoint has no multi-turn message array: an OpenAI-style `messages`
//! list is flattened into one formatted prompt string, and tuning parameters
//! nest under a `parameters` sub-object. Auth is always header-based.

use serde_json::{json, Value};

use crate::config::TuningDefaults;
use crate::error::{GatewayError, Result};
use crate::registry::ModelConfig;

use super::types::{messages_from_params, CallParams};
use super::{PreparedRequest, RequestBody, ResponseMode};

/// Flatten a message list into `"Role: content"` blocks joined by blank lines.
pub fn format_messages_as_prompt(params: &CallParams) -> String {
    messages_from_params(params)
        .iter()
        .map(|m| {
            let mut role = m.role.clone();
            if let Some(first) = role.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{}: {}", role, m.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn prepare(
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<PreparedRequest> {
    let prompt_text = if params.contains_key("messages") {
        format_messages_as_prompt(params)
    } else {
        params
            .get("prompt_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    if prompt_text.is_empty() {
        return Err(GatewayError::MissingRequiredParameter("prompt_text".into()));
    }

    let pick = |key: &str, fallback: Value| params.get(key).cloned().unwrap_or(fallback);
    let body = json!({
        "model_id": model.model_id,
        "prompt_text": prompt_text,
        "parameters": {
            "temperature": pick("temperature", json!(defaults.temperature)),
            "top_p": pick("top_p", json!(defaults.top_p)),
            "max_tokens": pick("max_tokens", json!(defaults.max_tokens)),
        }
    });

    let headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (model.auth_key_name.clone(), model.api_token.clone()),
    ];

    Ok(PreparedRequest {
        url: model.api_url.clone(),
        headers,
        body: RequestBody::Json(body),
        response_mode: ResponseMode::Json,
        temp_file: None,
    })
}
