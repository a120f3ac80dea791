//! Shared fixtures for gateway integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use switchboard_core::config::{Config, ModelEntry};
use switchboard_core::tools::RemoteApiClient;
use wiremock::{Request, Respond, ResponseTemplate};

/// Build a model entry pointing at a mock server.
pub fn model_entry(alias: &str, family: &str, url: String, required: &[&str]) -> ModelEntry {
    ModelEntry {
        alias: alias.into(),
        family: family.into(),
        api_url: url,
        api_token: "test-token".into(),
        auth_key_name: "api-key".into(),
        required_params: required.iter().map(|s| s.to_string()).collect(),
        model_id: format!("{alias}-backend"),
        ..ModelEntry::default()
    }
}

pub fn config_with(models: Vec<ModelEntry>) -> Config {
    Config { models, ..Config::default() }
}

/// OpenAI-style chat completion body with the given content.
pub fn chat_body(content: &str) -> Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "model": "mock-backend",
        "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
    })
}

pub fn params(raw: &str) -> serde_json::Map<String, Value> {
    serde_json::from_str(raw).unwrap()
}

/// Responds with scripted bodies in order; the final body repeats once the
/// script is exhausted.
pub struct ScriptedResponder {
    bodies: Mutex<VecDeque<Value>>,
    last: Mutex<Value>,
}

impl ScriptedResponder {
    pub fn new(bodies: Vec<Value>) -> Self {
        let last = bodies.last().cloned().unwrap_or(Value::Null);
        Self {
            bodies: Mutex::new(bodies.into()),
            last: Mutex::new(last),
        }
    }
}

impl Respond for ScriptedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let mut queue = self.bodies.lock().unwrap();
        let body = match queue.pop_front() {
            Some(body) => {
                *self.last.lock().unwrap() = body.clone();
                body
            }
            None => self.last.lock().unwrap().clone(),
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Remote API stub that counts invocations.
pub struct CountingRemote {
    pub calls: AtomicU32,
    pub result: Value,
}

impl CountingRemote {
    pub fn new(result: Value) -> Self {
        Self { calls: AtomicU32::new(0), result }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApiClient for CountingRemote {
    async fn post_form(&self, _envelope: &serde_json::Map<String, Value>) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// A redcap_api tool requiring `record_id`.
pub fn record_tool() -> Value {
    json!({
        "name": "get_record",
        "description": "Fetch one record by id",
        "endpoint": "redcap_api",
        "parameters": {
            "type": "object",
            "properties": {"record_id": {"type": "string"}},
            "required": ["record_id"]
        },
        "remoteAction": {"action": "export", "content": "record"}
    })
}
