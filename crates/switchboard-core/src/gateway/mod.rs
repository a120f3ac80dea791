//! Gateway entry point.
//!
//! `Gateway::call_ai` is the single public door: it routes a request down
//! the direct single-call path or the agent loop, then passes whatever came
//! out — success or typed error — through the output sanitizer so callers
//! always receive one uniform envelope. Configuration is an immutable
//! snapshot shared by reference; concurrent calls share nothing else.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agent;
use crate::budget;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::normalize::normalize;
use crate::provider;
use crate::provider::types::{CallParams, NormalizedResponse};
use crate::registry::{ModelConfig, ModelRegistry, ProviderFamily};
use crate::retry::with_retries;
use crate::sanitize::{sanitize, PublicResponse};
use crate::tools::{ActionDispatcher, RemoteApiClient};

/// Who is calling, for audit and tool-catalog scoping.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub project_id: Option<String>,
}

/// One audit record handed to the log sink.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub project_id: Option<String>,
    pub alias: String,
    pub params: Value,
    pub outcome: Value,
}

/// Append-only audit sink. Fire-and-forget: the gateway never consumes a
/// return value and never fails a call over logging.
pub trait CallLogSink: Send + Sync {
    fn record(&self, record: &CallRecord);
}

/// Supplies the per-caller tool catalog as raw JSON definitions.
pub trait ToolSource: Send + Sync {
    fn tools_for(&self, project: Option<&str>) -> Vec<Value>;
}

/// The model gateway.
pub struct Gateway {
    config: Arc<Config>,
    registry: ModelRegistry,
    http: reqwest::Client,
    action_dispatcher: Option<Arc<dyn ActionDispatcher>>,
    remote_api: Option<Arc<dyn RemoteApiClient>>,
    log_sink: Option<Arc<dyn CallLogSink>>,
    tool_source: Option<Arc<dyn ToolSource>>,
}

impl Gateway {
    pub fn new(config: Arc<Config>) -> Self {
        let registry = ModelRegistry::from_config(&config);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_seconds))
            .build()
            .unwrap_or_default();
        info!(models = registry.len(), "Gateway initialized");
        Self {
            config,
            registry,
            http,
            action_dispatcher: None,
            remote_api: None,
            log_sink: None,
            tool_source: None,
        }
    }

    pub fn with_action_dispatcher(mut self, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        self.action_dispatcher = Some(dispatcher);
        self
    }

    pub fn with_remote_api_client(mut self, client: Arc<dyn RemoteApiClient>) -> Self {
        self.remote_api = Some(client);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn CallLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_tool_source(mut self, source: Arc<dyn ToolSource>) -> Self {
        self.tool_source = Some(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub(crate) fn action_dispatcher(&self) -> Option<&dyn ActionDispatcher> {
        self.action_dispatcher.as_deref()
    }

    pub(crate) fn remote_api_client(&self) -> Option<&dyn RemoteApiClient> {
        self.remote_api.as_deref()
    }

    /// Tool catalog source: the configured store when present, otherwise
    /// the definitions embedded in the config snapshot.
    pub(crate) fn tools_for(&self, project: Option<&str>) -> Vec<Value> {
        match &self.tool_source {
            Some(source) => source.tools_for(project),
            None => self.config.tools.clone(),
        }
    }

    /// The primary entry point. Never returns an error: every failure is
    /// sanitized into the same envelope a success uses.
    pub async fn call_ai(
        &self,
        alias: &str,
        params: &CallParams,
        caller: Option<&CallerContext>,
    ) -> PublicResponse {
        let agent_mode = params
            .get("agent_mode")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let outcome = if agent_mode {
            let project = caller.and_then(|c| c.project_id.as_deref());
            agent::run(self, alias, params, project)
                .await
                .map(NormalizedResponse::Chat)
        } else {
            self.single_call(alias, params).await
        };

        self.audit(caller, alias, params, &outcome);
        sanitize(outcome)
    }

    /// One logical call: resolve → validate → budget → adapter → normalize,
    /// wrapped in bounded retries that re-run the whole attempt. Used by
    /// the direct path and by every agent-loop iteration.
    pub(crate) async fn single_call(
        &self,
        alias: &str,
        params: &CallParams,
    ) -> Result<NormalizedResponse> {
        with_retries(self.config.http.max_retries, |attempt| async move {
            // Re-resolved per attempt so a refreshed snapshot is honored.
            let model = self.registry.resolve(alias)?;
            validate_required_params(model, params)?;
            let derived = self.apply_budget(model, params);
            debug!(alias, attempt, family = model.family.as_str(), "Dispatching provider call");

            let raw =
                provider::send_request(&self.http, model, &self.config.defaults, &derived).await?;
            let normalized = normalize(raw, model.family, &model.alias)?;
            diagnose_zero_usage(alias, &normalized);
            Ok(normalized)
        })
        .await
    }

    /// Insert the computed completion budget into a derived copy of the
    /// caller's parameters, unless the caller already chose one. The
    /// caller's own map is never mutated.
    fn apply_budget(&self, model: &ModelConfig, params: &CallParams) -> CallParams {
        let mut derived = params.clone();
        let text_family = matches!(
            model.family,
            ProviderFamily::Chat
                | ProviderFamily::Reasoning
                | ProviderFamily::Claude
                | ProviderFamily::Gemini
        );
        if !text_family {
            return derived;
        }

        let param_name = budget::completion_param_name(model.family);
        if derived.contains_key(param_name) || derived.contains_key("max_tokens") {
            return derived;
        }

        let prompt_text = derived
            .get("messages")
            .map(|m| m.to_string())
            .unwrap_or_default();
        let token_budget = budget::compute_budget(model, &prompt_text);
        debug!(
            alias = %model.alias,
            param = token_budget.param_name,
            value = token_budget.max_value,
            estimated_prompt_tokens = token_budget.estimated_prompt_tokens,
            "Computed completion budget"
        );
        derived.insert(token_budget.param_name.into(), json!(token_budget.max_value));
        derived
    }

    /// Hand the interaction to the audit sink, success or failure alike.
    fn audit(
        &self,
        caller: Option<&CallerContext>,
        alias: &str,
        params: &CallParams,
        outcome: &Result<NormalizedResponse>,
    ) {
        let Some(sink) = &self.log_sink else {
            return;
        };
        let outcome_value = match outcome {
            Ok(NormalizedResponse::Chat(c)) => json!({
                "role": c.role,
                "content": c.content,
                "model": c.model,
                "usage": c.usage,
            }),
            Ok(NormalizedResponse::Passthrough(v)) => v.clone(),
            Ok(NormalizedResponse::Audio { content_type, .. }) => {
                json!({"content_type": content_type, "audio": "<binary>"})
            }
            Ok(NormalizedResponse::Transcript { format, .. }) => {
                json!({"format": format})
            }
            Err(e) => json!({"error": true, "kind": e.kind(), "message": e.to_string()}),
        };
        let record = CallRecord {
            timestamp: chrono::Utc::now(),
            project_id: caller.and_then(|c| c.project_id.clone()),
            alias: alias.to_string(),
            params: Value::Object(params.clone()),
            outcome: outcome_value,
        };
        sink.record(&record);
    }
}

/// Every required parameter must be present and non-empty before any
/// network work begins.
fn validate_required_params(model: &ModelConfig, params: &CallParams) -> Result<()> {
    for name in &model.required_params {
        let present = match params.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(GatewayError::MissingRequiredParameter(name.clone()));
        }
    }
    Ok(())
}

/// Zero reported usage sometimes means an upstream swallowed the call.
/// A heuristic, not an invariant: log it, never fail on it.
fn diagnose_zero_usage(alias: &str, response: &NormalizedResponse) {
    if let NormalizedResponse::Chat(c) = response {
        if c.usage.total_tokens == 0 {
            warn!(alias, "Provider reported zero usage tokens; possible upstream failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelEntry;

    fn model(required: &[&str]) -> ModelConfig {
        let entry = ModelEntry {
            alias: "gpt-4o".into(),
            family: "chat".into(),
            api_url: "https://x.test".into(),
            api_token: "tok".into(),
            auth_key_name: "api-key".into(),
            required_params: required.iter().map(|s| s.to_string()).collect(),
            model_id: "gpt-4o".into(),
            ..ModelEntry::default()
        };
        let config = Config { models: vec![entry], ..Config::default() };
        let registry = ModelRegistry::from_config(&config);
        registry.resolve("gpt-4o").unwrap().clone()
    }

    fn params(raw: &str) -> CallParams {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_required_params_present() {
        let m = model(&["messages"]);
        assert!(validate_required_params(&m, &params(r#"{"messages": [{"role": "user"}]}"#)).is_ok());
    }

    #[test]
    fn test_required_params_missing() {
        let m = model(&["messages"]);
        let err = validate_required_params(&m, &params("{}")).unwrap_err();
        assert!(matches!(err, GatewayError::MissingRequiredParameter(name) if name == "messages"));
    }

    #[test]
    fn test_required_params_empty_values_rejected() {
        let m = model(&["input"]);
        assert!(validate_required_params(&m, &params(r#"{"input": ""}"#)).is_err());
        assert!(validate_required_params(&m, &params(r#"{"input": null}"#)).is_err());
        assert!(validate_required_params(&m, &params(r#"{"input": []}"#)).is_err());
        assert!(validate_required_params(&m, &params(r#"{"input": "hello"}"#)).is_ok());
    }

    #[test]
    fn test_apply_budget_respects_caller_choice() {
        let config = Arc::new(Config::default());
        let gateway = Gateway::new(config);
        let m = model(&[]);
        let derived = gateway.apply_budget(&m, &params(r#"{"max_tokens": 42, "messages": []}"#));
        assert_eq!(derived["max_tokens"], json!(42));
    }

    #[test]
    fn test_apply_budget_inserts_computed_value() {
        let config = Arc::new(Config::default());
        let gateway = Gateway::new(config);
        let m = model(&[]);
        let derived = gateway.apply_budget(&m, &params(r#"{"messages": [{"role": "user", "content": "hi"}]}"#));
        let value = derived["max_tokens"].as_u64().unwrap() as u32;
        assert!(value >= budget::MIN_COMPLETION_TOKENS);
        assert!(value <= budget::DEFAULT_OUTPUT_MAX);
    }

    #[test]
    fn test_caller_params_never_mutated() {
        let config = Arc::new(Config::default());
        let gateway = Gateway::new(config);
        let m = model(&[]);
        let original = params(r#"{"messages": []}"#);
        let _ = gateway.apply_budget(&m, &original);
        assert!(original.get("max_tokens").is_none());
    }
}
