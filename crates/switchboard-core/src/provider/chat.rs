//! Chat-completion family adapters.
//!
//! Covers OpenAI-compatible and generic-compatible endpoints, plus the
//! reasoning tier that bills by `max_completion_tokens` and accepts only a
//! narrow allow-list of fields.

use serde_json::{json, Map, Value};

use crate::config::TuningDefaults;
use crate::error::Result;
use crate::registry::ModelConfig;

use super::types::CallParams;
use super::{json_headers_with_auth, PreparedRequest, RequestBody, ResponseMode};

/// Fields the gateway consumes itself and must never put on the wire.
const CONTROL_FIELDS: &[&str] = &["agent_mode"];

/// Default tuning parameters as a JSON map, merged under caller overrides.
fn defaults_map(defaults: &TuningDefaults) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("temperature".into(), json!(defaults.temperature));
    map.insert("top_p".into(), json!(defaults.top_p));
    map.insert("frequency_penalty".into(), json!(defaults.frequency_penalty));
    map.insert("presence_penalty".into(), json!(defaults.presence_penalty));
    map.insert("max_tokens".into(), json!(defaults.max_tokens));
    if let Some(effort) = &defaults.reasoning_effort {
        map.insert("reasoning_effort".into(), json!(effort));
    }
    map
}

/// Repackage a flat `json_schema` field into the provider's structured-output
/// envelope and remove it from the parameter set.
fn wrap_json_schema(merged: &mut Map<String, Value>) {
    if let Some(schema) = merged.remove("json_schema") {
        merged.insert(
            "response_format".into(),
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "agent_response",
                    "strict": true,
                    "schema": schema
                }
            }),
        );
    }
}

/// Normalize empty-array values that must serialize as empty objects.
///
/// A schema that round-tripped through a loosely typed upstream can carry
/// `"properties": []` where the wire format requires `{}`. `required` and
/// `enum` stay arrays even when empty.
pub fn fix_empty_schema_objects(value: Value) -> Value {
    fix_inner(value, None)
}

fn fix_inner(value: Value, key: Option<&str>) -> Value {
    match value {
        Value::Array(items) => {
            if items.is_empty() && key == Some("properties") {
                return Value::Object(Map::new());
            }
            Value::Array(items.into_iter().map(|v| fix_inner(v, None)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let fixed = if k == "required" || k == "enum" {
                        v
                    } else {
                        fix_inner(v, Some(&k))
                    };
                    (k, fixed)
                })
                .collect(),
        ),
        other => other,
    }
}

/// Prepare an OpenAI-compatible chat-completion request.
///
/// Default tuning parameters merge under caller overrides; the
/// reasoning-effort knob is stripped because this tier rejects it.
pub fn prepare_chat(
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<PreparedRequest> {
    let mut merged = defaults_map(defaults);
    for (key, value) in params {
        merged.insert(key.clone(), value.clone());
    }
    for field in CONTROL_FIELDS {
        merged.remove(*field);
    }
    merged.remove("reasoning_effort");
    merged.insert("model".into(), json!(model.model_id));
    wrap_json_schema(&mut merged);

    let body = fix_empty_schema_objects(Value::Object(merged));
    let (url, headers) = json_headers_with_auth(model);

    Ok(PreparedRequest {
        url,
        headers,
        body: RequestBody::Json(body),
        response_mode: ResponseMode::Json,
        temp_file: None,
    })
}

/// Prepare a reasoning-tier request.
///
/// These models accept only `model`, `messages`, the completion-token field,
/// an optional schema, and an optional reasoning effort. Every other caller
/// field is dropped, not merged.
pub fn prepare_reasoning(
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<PreparedRequest> {
    let mut body = Map::new();
    body.insert("model".into(), json!(model.model_id));
    body.insert(
        "messages".into(),
        params.get("messages").cloned().unwrap_or_else(|| json!([])),
    );
    let max_completion = params
        .get("max_completion_tokens")
        .or_else(|| params.get("max_tokens"))
        .cloned()
        .unwrap_or_else(|| json!(defaults.max_tokens));
    body.insert("max_completion_tokens".into(), max_completion);

    if let Some(schema) = params.get("json_schema") {
        body.insert("json_schema".into(), schema.clone());
        wrap_json_schema(&mut body);
    }
    let effort = params
        .get("reasoning_effort")
        .cloned()
        .or_else(|| defaults.reasoning_effort.as_ref().map(|e| json!(e)));
    if let Some(effort) = effort {
        body.insert("reasoning_effort".into(), effort);
    }

    let body = fix_empty_schema_objects(Value::Object(body));
    let (url, headers) = json_headers_with_auth(model);

    Ok(PreparedRequest {
        url,
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

    fn model(auth_key_name: &str) -> ModelConfig {
        ModelConfig {
            alias: "gpt-4o".into(),
            family: ProviderFamily::Chat,
            api_url: "https://x.test/v1/chat/completions".into(),
            api_token: "tok".into(),
            auth_key_name: auth_key_name.into(),
            required_params: vec!["messages".into()],
            model_id: "gpt-4o-2024".into(),
            context_window: None,
            output_max: None,
        }
    }

    fn params(raw: &str) -> CallParams {
        serde_json::from_str(raw).unwrap()
    }

    fn body_of(prepared: &PreparedRequest) -> &Value {
        match &prepared.body {
            RequestBody::Json(v) => v,
            _ => panic!("expected JSON body"),
        }
    }

    #[test]
    fn test_defaults_merge_under_caller_overrides() {
        let p = params(r#"{"messages": [], "temperature": 0.1}"#);
        let prepared = prepare_chat(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        let body = body_of(&prepared);
        assert_eq!(body["temperature"], json!(0.1));
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["model"], json!("gpt-4o-2024"));
        assert!(body.get("reasoning_effort").is_none());
        assert!(body.get("agent_mode").is_none());
    }

    #[test]
    fn test_query_auth_placement() {
        let p = params(r#"{"messages": []}"#);
        let prepared = prepare_chat(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        assert!(prepared.url.ends_with("?api-key=tok"));
        assert!(!prepared.headers.iter().any(|(k, _)| k == "api-key"));
    }

    #[test]
    fn test_header_auth_placement() {
        let p = params(r#"{"messages": []}"#);
        let prepared =
            prepare_chat(&model("Ocp-Apim-Subscription-Key"), &TuningDefaults::default(), &p)
                .unwrap();
        assert!(!prepared.url.contains("tok"));
        assert!(prepared
            .headers
            .iter()
            .any(|(k, v)| k == "Ocp-Apim-Subscription-Key" && v == "tok"));
    }

    #[test]
    fn test_json_schema_envelope() {
        let p = params(r#"{"messages": [], "json_schema": {"type": "object"}}"#);
        let prepared = prepare_chat(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        let body = body_of(&prepared);
        assert!(body.get("json_schema").is_none());
        let rf = &body["response_format"];
        assert_eq!(rf["type"], json!("json_schema"));
        assert_eq!(rf["json_schema"]["name"], json!("agent_response"));
        assert_eq!(rf["json_schema"]["strict"], json!(true));
        assert_eq!(rf["json_schema"]["schema"]["type"], json!("object"));
    }

    #[test]
    fn test_empty_properties_serializes_as_object() {
        let p = params(
            r#"{"messages": [], "json_schema": {"type": "object", "properties": [], "required": []}}"#,
        );
        let prepared = prepare_chat(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        let schema = &body_of(&prepared)["response_format"]["json_schema"]["schema"];
        assert!(schema["properties"].is_object());
        assert!(schema["required"].is_array());
        let wire = serde_json::to_string(schema).unwrap();
        assert!(wire.contains("\"properties\":{}"));
        assert!(wire.contains("\"required\":[]"));
    }

    #[test]
    fn test_reasoning_allow_list() {
        let p = params(
            r#"{"messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.9, "top_p": 0.5, "frequency_penalty": 1.0,
                "reasoning_effort": "high", "max_completion_tokens": 2048}"#,
        );
        let prepared =
            prepare_reasoning(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        let body = body_of(&prepared);
        assert!(body.get("temperature").is_none());
        assert!(body.get("top_p").is_none());
        assert!(body.get("frequency_penalty").is_none());
        assert_eq!(body["max_completion_tokens"], json!(2048));
        assert_eq!(body["reasoning_effort"], json!("high"));
        assert_eq!(body["model"], json!("gpt-4o-2024"));
    }

    #[test]
    fn test_reasoning_defaults_completion_budget() {
        let p = params(r#"{"messages": []}"#);
        let prepared =
            prepare_reasoning(&model("api-key"), &TuningDefaults::default(), &p).unwrap();
        assert_eq!(body_of(&prepared)["max_completion_tokens"], json!(800));
    }
}
