//! Embedding family adapter.
//!
//! The request body is `{model, input}` and nothing else: chat tuning
//! defaults must never leak into an embedding call.

use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::registry::ModelConfig;

use super::types::CallParams;
use super::{json_headers_with_auth, PreparedRequest, RequestBody, ResponseMode};

pub fn prepare(model: &ModelConfig, params: &CallParams) -> Result<PreparedRequest> {
    let mut body = Map::new();
    body.insert("model".into(), json!(model.model_id));
    body.insert(
        "input".into(),
        params.get("input").cloned().unwrap_or(Value::Null),
    );

    let (url, headers) = json_headers_with_auth(model);
    Ok(PreparedRequest {
        url,
        headers,
        body: RequestBody::Json(Value::Object(body)),
        response_mode: ResponseMode::Json,
        temp_file: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderFamily;

    #[test]
    fn test_body_is_model_and_input_only() {
        let model = ModelConfig {
            alias: "ada-002".into(),
            family: ProviderFamily::Embedding,
            api_url: "https://x.test/v1/embeddings".into(),
            api_token: "tok".into(),
            auth_key_name: "api-key".into(),
            required_params: vec!["input".into()],
            model_id: "text-embedding-ada-002".into(),
            context_window: None,
            output_max: None,
        };
        let params: CallParams =
            serde_json::from_str(r#"{"input": "hello", "temperature": 0.7}"#).unwrap();
        let prepared = prepare(&model, &params).unwrap();
        match &prepared.body {
            RequestBody::Json(Value::Object(map)) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map["model"], json!("text-embedding-ada-002"));
                assert_eq!(map["input"], json!("hello"));
                assert!(map.get("temperature").is_none());
            }
            _ => panic!("expected JSON object body"),
        }
    }
}
