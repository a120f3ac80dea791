//! Configuration module for switchboard.
//!
//! Loads typed configuration from `~/.switchboard/config.json`.
//! All fields use `serde` for zero-boilerplate deserialization. The loaded
//! value is an immutable snapshot: it is built once, wrapped in an `Arc`,
//! and passed by reference into every component. A config change on disk is
//! not observed by calls already in flight.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: Vec<ModelEntry>,
    pub defaults: TuningDefaults,
    pub agent: AgentLimits,
    pub http: HttpConfig,
    /// Raw tool definitions, validated by `ToolCatalog` on load.
    pub tools: Vec<serde_json::Value>,
}

impl Config {
    /// Load configuration from the default path (`~/.switchboard/config.json`).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".switchboard")
            .join("config.json")
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "models": [
                {
                    "alias": "gpt-4o",
                    "family": "chat",
                    "apiUrl": "https://api.openai.com/v1/chat/completions",
                    "apiToken": "sk-YOUR_KEY_HERE",
                    "authKeyName": "api-key",
                    "requiredParams": ["messages"],
                    "modelId": "gpt-4o"
                }
            ],
            "agent": {
                "defaultModel": "gpt-4o"
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }
}

// ── Model Registry Rows ─────────────────────────────────────────────

/// One configured model alias.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelEntry {
    /// Caller-facing short name (e.g. "claude", "ada-002").
    pub alias: String,
    /// Provider family tag; see `registry::ProviderFamily`.
    pub family: String,
    pub api_url: String,
    pub api_token: String,
    /// Header name or query-string key carrying the credential.
    pub auth_key_name: String,
    /// Parameters the caller must supply before any network call happens.
    pub required_params: Vec<String>,
    /// Provider-side model identifier (distinct from the alias).
    pub model_id: String,
    /// Context window in tokens, when known.
    pub context_window: Option<u32>,
    /// Maximum completion tokens the provider accepts, when known.
    pub output_max: Option<u32>,
}

// ── Tuning Defaults ─────────────────────────────────────────────────

/// Default chat tuning parameters merged under caller overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TuningDefaults {
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub max_tokens: u32,
    pub reasoning_effort: Option<String>,
}

impl Default for TuningDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            frequency_penalty: 0.5,
            presence_penalty: 0.0,
            max_tokens: 800,
            reasoning_effort: None,
        }
    }
}

// ── Agent Limits ────────────────────────────────────────────────────

/// Hard limits on one agent run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentLimits {
    pub max_steps: u32,
    pub max_tools_per_run: u32,
    pub timeout_seconds: u64,
    pub max_tool_result_chars: usize,
    /// Structured-output-capable alias substituted when the requested model
    /// cannot honor a JSON schema in agent mode.
    pub default_model: String,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_steps: 8,
            max_tools_per_run: 15,
            timeout_seconds: 120,
            max_tool_result_chars: 8000,
            default_model: String::new(),
        }
    }
}

// ── HTTP Configuration ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    /// Full-call retries after the first attempt.
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_retries: 2,
        }
    }
}
