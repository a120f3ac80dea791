//! Gemini-style family adapter.
//!
//! Gemini has no system role: all `system` content is concatenated and
//! prepended into the first `user` turn, or inserted as a new leading
//! `user` turn when none exists. Safety thresholds are a fixed default
//! block list, not configurable.

use serde_json::{json, Value};

use crate::config::TuningDefaults;
use crate::error::Result;
use crate::registry::ModelConfig;

use super::types::{messages_from_params, CallParams};
use super::{PreparedRequest, RequestBody, ResponseMode};

/// Convert an OpenAI-style message list to Gemini `contents`.
pub fn contents_from_messages(params: &CallParams) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut system_context = String::new();

    for message in messages_from_params(params) {
        if message.role == "system" {
            system_context.push_str(message.content.trim());
            system_context.push_str("\n\n");
        } else {
            contents.push(json!({
                "role": message.role,
                "parts": [{"text": message.content.trim()}]
            }));
        }
    }

    if !system_context.is_empty() {
        let first_is_user = contents
            .first()
            .and_then(|c| c.get("role"))
            .and_then(Value::as_str)
            == Some("user");
        if first_is_user {
            let existing = contents[0]["parts"][0]["text"].as_str().unwrap_or_default();
            contents[0]["parts"][0]["text"] = json!(format!("{system_context}{existing}"));
        } else {
            contents.insert(0, json!({"role": "user", "parts": [{"text": system_context}]}));
        }
    }

    contents
}

pub fn prepare(
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<PreparedRequest> {
    let pick = |key: &str, fallback: Value| params.get(key).cloned().unwrap_or(fallback);
    let body = json!({
        "contents": contents_from_messages(params),
        "generation_config": {
            "temperature": pick("temperature", json!(defaults.temperature)),
            "topP": pick("top_p", json!(defaults.top_p)),
            "topK": 40,
            "maxOutputTokens": pick("max_tokens", json!(defaults.max_tokens)),
            "frequencyPenalty": pick("frequency_penalty", json!(defaults.frequency_penalty)),
            "presencePenalty": pick("presence_penalty", json!(defaults.presence_penalty)),
        },
        "safety_settings": [{
            "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "threshold": "BLOCK_LOW_AND_ABOVE"
        }]
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderFamily;

    fn model() -> ModelConfig {
        ModelConfig {
            alias: "gemini15pro".into(),
            family: ProviderFamily::Gemini,
            api_url: "https://x.test/gemini".into(),
            api_token: "tok".into(),
            auth_key_name: "x-goog-api-key".into(),
            required_params: vec!["messages".into()],
            model_id: "gemini-1.5-pro".into(),
            context_window: None,
            output_max: None,
        }
    }

    fn params(raw: &str) -> CallParams {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_system_prepended_into_first_user_turn() {
        let p = params(
            r#"{"messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"}
            ]}"#,
        );
        let contents = contents_from_messages(&p);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], json!("user"));
        assert_eq!(contents[0]["parts"][0]["text"], json!("Be brief.\n\nhi"));
    }

    #[test]
    fn test_system_becomes_leading_user_turn_when_no_user() {
        let p = params(
            r#"{"messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "assistant", "content": "ready"}
            ]}"#,
        );
        let contents = contents_from_messages(&p);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], json!("user"));
        assert_eq!(contents[0]["parts"][0]["text"], json!("Be brief.\n\n"));
        assert_eq!(contents[1]["role"], json!("assistant"));
    }

    #[test]
    fn test_generation_config_field_names() {
        let p = params(r#"{"messages": [{"role": "user", "content": "hi"}], "max_tokens": 512}"#);
        let prepared = prepare(&model(), &TuningDefaults::default(), &p).unwrap();
        match &prepared.body {
            RequestBody::Json(body) => {
                let gc = &body["generation_config"];
                assert_eq!(gc["topP"], json!(0.9));
                assert_eq!(gc["topK"], json!(40));
                assert_eq!(gc["maxOutputTokens"], json!(512));
                assert_eq!(gc["frequencyPenalty"], json!(0.5));
                let safety = body["safety_settings"].as_array().unwrap();
                assert_eq!(safety.len(), 1);
                assert_eq!(safety[0]["threshold"], json!("BLOCK_LOW_AND_ABOVE"));
            }
            _ => panic!("expected JSON body"),
        }
    }
}
