//! Agent orchestration loop.
//!
//! Runs the multi-step tool-calling state machine on top of the single-call
//! path: inject the router prompt and tool catalog, decode each model turn
//! as `tool_call` vs `final_answer`, execute tools through the configured
//! collaborators, and feed capped results back as conversation context.
//! Step count, tool count, wall-clock time, and a repeated-call window all
//! bound the loop.

pub mod cap;
pub mod decode;

use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::budget;
use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::provider::types::{CallParams, ChatResponse, ToolUse};
use crate::tools::{build_remote_envelope, ToolCatalog, ToolDefinition, ToolEndpoint};
use cap::cap_tool_result;
use decode::{decode_directive, Directive};

/// Sliding window of recent call signatures inspected for loops.
const LOOP_WINDOW: usize = 5;

/// Occurrences of one signature within the window that trigger detection.
const LOOP_THRESHOLD: usize = 3;

/// Router system prompt injected ahead of the caller's messages.
const ROUTER_PROMPT: &str = "You are a routing assistant. You may either answer \
the user directly or call one of the available tools.\n\
Respond with exactly one JSON object and nothing else:\n\
- To call a tool: {\"tool_call\": {\"name\": \"<tool name>\", \"arguments\": {<parameters>}}}\n\
- To answer: {\"final_answer\": \"<your answer>\"}\n\
Call one tool at a time and wait for its result before deciding the next step.";

/// Structured-output schema the router protocol is pinned to.
fn agent_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool_call": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "arguments": {"type": "object"}
                },
                "required": ["name"]
            },
            "final_answer": {"type": "string"}
        },
        "additionalProperties": false
    })
}

/// Caller fields replaced by the gateway's own tool protocol.
const STRIPPED_FIELDS: &[&str] = &["tools", "tool_choice", "response_format", "json_schema", "agent_mode"];

/// Loop-local state; created at entry, discarded at exit.
struct AgentState {
    messages: Vec<Value>,
    step_count: u32,
    tools_called: u32,
    call_history: Vec<String>,
    tools_used: Vec<ToolUse>,
    start: Instant,
}

impl AgentState {
    fn push_message(&mut self, role: &str, content: &str) {
        self.messages.push(json!({"role": role, "content": content}));
    }

    /// Record a call signature and report whether it now repeats too often
    /// within the recent window.
    fn record_and_detect_loop(&mut self, signature: String) -> bool {
        let latest = signature.clone();
        self.call_history.push(signature);
        let window_start = self.call_history.len().saturating_sub(LOOP_WINDOW);
        self.call_history[window_start..]
            .iter()
            .filter(|s| **s == latest)
            .count()
            >= LOOP_THRESHOLD
    }
}

/// Pick the model that will serve this run. A requested model that cannot
/// honor structured JSON output is swapped for the configured capable
/// default — agent mode only, never the direct path.
fn select_model<'a>(gateway: &'a Gateway, requested: &'a str) -> Result<&'a str> {
    let model = gateway.registry().resolve(requested)?;
    if model.family.supports_json_schema() {
        return Ok(requested);
    }
    let fallback = gateway.config().agent.default_model.as_str();
    if !fallback.is_empty() && gateway.registry().has(fallback) {
        info!(requested, fallback, "Substituting structured-output-capable model for agent run");
        Ok(fallback)
    } else {
        warn!(requested, "No structured-output-capable fallback configured; keeping requested model");
        Ok(requested)
    }
}

/// Run the agent loop. Terminal errors are returned typed; the gateway's
/// sanitizer turns them into the public envelope.
pub(crate) async fn run(
    gateway: &Gateway,
    alias: &str,
    params: &CallParams,
    project: Option<&str>,
) -> Result<ChatResponse> {
    let catalog = ToolCatalog::from_values(&gateway.tools_for(project))?;
    let served_alias = select_model(gateway, alias)?.to_string();
    let limits = &gateway.config().agent;

    let mut state = AgentState {
        messages: Vec::new(),
        step_count: 0,
        tools_called: 0,
        call_history: Vec::new(),
        tools_used: Vec::new(),
        start: Instant::now(),
    };

    let system = if catalog.is_empty() {
        ROUTER_PROMPT.to_string()
    } else {
        format!("{ROUTER_PROMPT}\n\nAvailable tools:\n{}", catalog.render())
    };
    state.push_message("system", &system);
    if let Some(caller_messages) = params.get("messages").and_then(Value::as_array) {
        state.messages.extend(caller_messages.iter().cloned());
    }

    info!(
        alias,
        served = %served_alias,
        tools = catalog.len(),
        "Starting agent run"
    );

    loop {
        if state.start.elapsed().as_secs() >= limits.timeout_seconds {
            return Err(GatewayError::Timeout);
        }
        state.step_count += 1;
        if state.step_count > limits.max_steps {
            return Err(GatewayError::AgentMaxStepsExceeded);
        }

        let call_params = build_call_params(gateway, &served_alias, params, &state.messages)?;
        let response = gateway.single_call(&served_alias, &call_params).await?;
        let (content, model, usage) = match &response {
            crate::provider::types::NormalizedResponse::Chat(c) => {
                (c.content.clone(), c.model.clone(), c.usage.clone())
            }
            // A non-chat modality cannot drive the protocol; surface what
            // we can instead of dropping it.
            _ => (String::new(), served_alias.clone(), Default::default()),
        };

        debug!(step = state.step_count, content_len = content.len(), "Agent step response");

        match decode_directive(&content) {
            Directive::FinalAnswer(answer) => {
                info!(steps = state.step_count, tools = state.tools_called, "Agent run complete");
                return Ok(ChatResponse {
                    role: "assistant".into(),
                    content: answer,
                    model,
                    usage,
                    tools_used: state.tools_used,
                    ..ChatResponse::default()
                });
            }
            Directive::Raw(text) => {
                // Defensive default: never silently drop output.
                info!(steps = state.step_count, "Agent run ended with non-protocol output");
                return Ok(ChatResponse {
                    role: "assistant".into(),
                    content: text,
                    model,
                    usage,
                    tools_used: state.tools_used,
                    ..ChatResponse::default()
                });
            }
            Directive::ToolCall { name, arguments } => {
                let tool = catalog
                    .get(&name)
                    .ok_or_else(|| GatewayError::UnknownTool(name.clone()))?;

                let missing = tool.missing_params(&arguments);
                if !missing.is_empty() {
                    info!(tool = %name, missing = ?missing, "Tool call needs more information");
                    return Ok(ChatResponse {
                        role: "assistant".into(),
                        content: format!(
                            "I need more information to run {name}. Please provide: {}.",
                            missing.join(", ")
                        ),
                        model,
                        usage,
                        tools_used: state.tools_used,
                        ..ChatResponse::default()
                    });
                }

                let signature = format!(
                    "{name}:{}",
                    serde_json::to_string(&arguments).unwrap_or_default()
                );
                if state.record_and_detect_loop(signature) {
                    return Err(GatewayError::ToolLoopDetected(name));
                }
                if state.tools_called >= limits.max_tools_per_run {
                    return Err(GatewayError::MaxToolsExceeded);
                }

                let result = execute_tool(gateway, tool, &arguments).await?;
                state.tools_called += 1;
                state.tools_used.push(ToolUse {
                    name: name.clone(),
                    arguments: Value::Object(arguments.clone()),
                    step: state.step_count,
                });

                let capped = cap_tool_result(&result, limits.max_tool_result_chars);
                state.push_message("assistant", &content);
                state.push_message(
                    "user",
                    &format!(
                        "Tool result for {name}:\n{}",
                        serde_json::to_string(&capped).unwrap_or_default()
                    ),
                );
            }
        }
    }
}

/// Derive the wire parameters for one loop iteration: caller params minus
/// native tool-calling fields, the current conversation, the router schema,
/// and a strict output budget for the serving model.
fn build_call_params(
    gateway: &Gateway,
    served_alias: &str,
    params: &CallParams,
    messages: &[Value],
) -> Result<CallParams> {
    let mut call_params = params.clone();
    for field in STRIPPED_FIELDS {
        call_params.remove(*field);
    }
    call_params.insert("messages".into(), Value::Array(messages.to_vec()));
    call_params.insert("json_schema".into(), agent_response_schema());

    let model = gateway.registry().resolve(served_alias)?;
    let prompt_text = serde_json::to_string(messages).unwrap_or_default();
    let token_budget = budget::compute_budget(model, &prompt_text);
    call_params.remove("max_tokens");
    call_params.insert(token_budget.param_name.into(), json!(token_budget.max_value));
    Ok(call_params)
}

async fn execute_tool(
    gateway: &Gateway,
    tool: &ToolDefinition,
    arguments: &Map<String, Value>,
) -> Result<Value> {
    debug!(tool = %tool.name, endpoint = tool.endpoint.as_str(), "Executing tool");
    match tool.endpoint {
        ToolEndpoint::ModuleApi => {
            let action = tool
                .module_action
                .as_deref()
                .ok_or_else(|| GatewayError::RemoteTool(format!("{}: no module action", tool.name)))?;
            let dispatcher = gateway.action_dispatcher().ok_or_else(|| {
                GatewayError::RemoteTool("no action dispatcher configured".into())
            })?;
            dispatcher
                .dispatch(action, arguments)
                .await
                .map_err(|e| GatewayError::RemoteTool(format!("{}: {e}", tool.name)))
        }
        ToolEndpoint::RedcapApi => {
            let spec = tool
                .remote_action
                .as_ref()
                .ok_or_else(|| GatewayError::RemoteTool(format!("{}: no remote action", tool.name)))?;
            let client = gateway.remote_api_client().ok_or_else(|| {
                GatewayError::RemoteTool("no remote API client configured".into())
            })?;
            let envelope = build_remote_envelope(spec, arguments);
            client
                .post_form(&envelope)
                .await
                .map_err(|e| GatewayError::RemoteTool(format!("{}: {e}", tool.name)))
        }
        ToolEndpoint::Http => {
            Err(GatewayError::UnsupportedToolEndpoint(tool.name.clone()))
        }
    }
}
