//! Gateway error kinds.
//!
//! The error set is closed: callers branch on the variant, never on the
//! message text. Anything the model-facing side of the gateway can fail
//! with must map onto one of these kinds before it reaches a caller.

use thiserror::Error;

/// Every failure path of the gateway terminates in one of these.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No model configuration exists for the requested alias.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// A parameter the model configuration marks as required is absent or empty.
    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(String),

    /// Transport or HTTP failure that survived every retry attempt.
    #[error("network error: {0}")]
    Network(String),

    /// The provider returned a body that did not decode as expected.
    #[error("response decode error: {0}")]
    ResponseDecode(String),

    /// The model requested a tool that is not in the caller's catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The model supplied a tool call without its required arguments.
    /// Non-fatal: surfaced to the end user as a clarification request.
    #[error("tool '{tool}' is missing parameters: {}", missing.join(", "))]
    MissingParameters { tool: String, missing: Vec<String> },

    /// A tool's remote or in-process execution failed.
    #[error("remote tool error: {0}")]
    RemoteTool(String),

    /// The same tool call repeated too often within the detection window.
    #[error("tool loop detected: {0}")]
    ToolLoopDetected(String),

    /// The run called more tools than the configured per-run maximum.
    #[error("maximum tools per run exceeded")]
    MaxToolsExceeded,

    /// The run exceeded its wall-clock budget.
    #[error("agent run timed out")]
    Timeout,

    /// The loop reached the configured maximum step count.
    #[error("agent maximum steps exceeded")]
    AgentMaxStepsExceeded,

    /// The caller's tool catalog contained no usable tool definitions.
    #[error("misconfigured tools: {0}")]
    MisconfiguredTools(String),

    /// A tool names an endpoint kind the gateway cannot dispatch.
    #[error("unsupported tool endpoint: {0}")]
    UnsupportedToolEndpoint(String),
}

impl GatewayError {
    /// Stable tag for logging and for the sanitizer's message table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedModel(_) => "UnsupportedModel",
            Self::MissingRequiredParameter(_) => "MissingRequiredParameter",
            Self::Network(_) => "NetworkError",
            Self::ResponseDecode(_) => "ResponseDecodeError",
            Self::UnknownTool(_) => "UnknownTool",
            Self::MissingParameters { .. } => "MissingParameters",
            Self::RemoteTool(_) => "RemoteToolError",
            Self::ToolLoopDetected(_) => "ToolLoopDetected",
            Self::MaxToolsExceeded => "MaxToolsExceeded",
            Self::Timeout => "Timeout",
            Self::AgentMaxStepsExceeded => "AgentMaxStepsExceeded",
            Self::MisconfiguredTools(_) => "MisconfiguredTools",
            Self::UnsupportedToolEndpoint(_) => "UnsupportedToolEndpoint",
        }
    }

    /// Whether the retry executor may re-attempt the whole call.
    ///
    /// Only transport and provider-shape failures are transient; every
    /// other kind would fail identically on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ResponseDecode(_))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
