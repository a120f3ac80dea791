//! Tool catalog: declarative definitions, validation, and dispatch contracts.
//!
//! Tool definitions arrive as raw JSON from the per-caller registry store.
//! Each one is statically validated before it is ever offered to a model;
//! invalid definitions are dropped with a logged reason, never silently
//! passed along. Execution goes through collaborator traits so the gateway
//! stays free of any in-process or remote implementation detail.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Where a tool call is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEndpoint {
    /// Named in-process action executed by the `ActionDispatcher`.
    ModuleApi,
    /// Signed remote form-POST through the `RemoteApiClient`.
    RedcapApi,
    /// Accepted by the validator but not dispatchable.
    Http,
}

impl ToolEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleApi => "module_api",
            Self::RedcapApi => "redcap_api",
            Self::Http => "http",
        }
    }
}

/// Remote-call envelope fragment carried by `redcap_api` tools.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteActionSpec {
    pub action: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// One validated tool definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub endpoint: ToolEndpoint,
    /// JSON-Schema object describing the arguments.
    pub parameters: Value,
    #[serde(default)]
    pub module_action: Option<String>,
    #[serde(default, alias = "remoteActionSpec")]
    pub remote_action: Option<RemoteActionSpec>,
}

impl ToolDefinition {
    /// Required argument names declared by the parameter schema.
    pub fn required_params(&self) -> Vec<String> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Required arguments absent (or empty) from a supplied argument map.
    pub fn missing_params(&self, arguments: &Map<String, Value>) -> Vec<String> {
        self.required_params()
            .into_iter()
            .filter(|name| {
                match arguments.get(name) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                }
            })
            .collect()
    }

    /// Static shape validation; `Err` carries the reason the definition
    /// cannot be offered to a model.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("tool name is empty".into());
        }
        if self.description.trim().is_empty() {
            return Err("tool description is empty".into());
        }
        if !self.parameters.is_object() {
            return Err("parameters is not a JSON-Schema object".into());
        }
        match self.endpoint {
            ToolEndpoint::ModuleApi if self.module_action.is_none() => {
                Err("module_api tool has no moduleAction".into())
            }
            ToolEndpoint::RedcapApi if self.remote_action.is_none() => {
                Err("redcap_api tool has no remoteAction".into())
            }
            _ => Ok(()),
        }
    }
}

/// The per-caller set of tools offered to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Build a catalog from raw definitions, dropping invalid entries with
    /// a logged reason. A non-empty source yielding zero usable tools is a
    /// configuration error.
    pub fn from_values(raw: &[Value]) -> Result<Self> {
        let mut tools = Vec::new();
        for value in raw {
            let parsed: ToolDefinition = match serde_json::from_value(value.clone()) {
                Ok(tool) => tool,
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable tool definition");
                    continue;
                }
            };
            match parsed.validate() {
                Ok(()) => {
                    debug!(tool = %parsed.name, endpoint = parsed.endpoint.as_str(), "Loaded tool");
                    tools.push(parsed);
                }
                Err(reason) => {
                    warn!(tool = %parsed.name, reason = %reason, "Dropping invalid tool definition");
                }
            }
        }

        if tools.is_empty() && !raw.is_empty() {
            return Err(GatewayError::MisconfiguredTools(format!(
                "{} tool definition(s) supplied, none usable",
                raw.len()
            )));
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the catalog for the router system prompt: name, description,
    /// and required-parameter list per tool.
    pub fn render(&self) -> String {
        self.tools
            .iter()
            .map(|tool| {
                let required = tool.required_params();
                let required = if required.is_empty() {
                    "none".to_string()
                } else {
                    required.join(", ")
                };
                format!(
                    "- {}: {} (required parameters: {})",
                    tool.name, tool.description, required
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fixed envelope for a signed remote form-POST. The client supplies the
/// credential; the gateway supplies everything else plus the tool arguments.
pub fn build_remote_envelope(
    spec: &RemoteActionSpec,
    arguments: &Map<String, Value>,
) -> Map<String, Value> {
    let mut envelope = Map::new();
    if let Some(content) = &spec.content {
        envelope.insert("content".into(), json!(content));
    }
    envelope.insert("format".into(), json!("json"));
    envelope.insert("returnFormat".into(), json!("json"));
    if let Some(prefix) = &spec.prefix {
        envelope.insert("prefix".into(), json!(prefix));
    }
    envelope.insert("action".into(), json!(spec.action));
    for (key, value) in arguments {
        envelope.insert(key.clone(), value.clone());
    }
    envelope
}

// ── Collaborator contracts ──────────────────────────────────────────

/// Executes a named local action with an argument map (`module_api` tools).
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, action: &str, arguments: &Map<String, Value>)
        -> anyhow::Result<Value>;
}

/// Performs a signed form-POST to a configured base URL (`redcap_api` tools).
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    async fn post_form(&self, envelope: &Map<String, Value>) -> anyhow::Result<Value>;
}
