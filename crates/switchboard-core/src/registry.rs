//! Model registry: alias → resolved model configuration.
//!
//! Built once from the config snapshot and treated as read-only for the
//! duration of one call or one agent run.

use std::collections::HashMap;
use tracing::warn;

use crate::config::{Config, ModelEntry};
use crate::error::{GatewayError, Result};

/// Provider families the gateway can speak to.
///
/// A closed set: each variant isolates one wire protocol's quirks and is
/// dispatched through a single `match` in the adapter layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// OpenAI-style `/chat/completions`, including generic compatibles.
    Chat,
    /// Models billed by `max_completion_tokens` with a reasoning-effort knob.
    Reasoning,
    /// `{model, input}` embedding endpoints.
    Embedding,
    /// Multipart audio transcription.
    Transcription,
    /// JSON-in, binary-audio-out text-to-speech.
    Speech,
    /// Claude-style single-prompt endpoints.
    Claude,
    /// Gemini-style `contents`/`parts` endpoints.
    Gemini,
}

impl ProviderFamily {
    /// Parse the config tag. Unknown tags are rejected so a typo cannot
    /// silently select the wrong wire protocol.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "chat" => Some(Self::Chat),
            "reasoning" => Some(Self::Reasoning),
            "embedding" => Some(Self::Embedding),
            "transcription" => Some(Self::Transcription),
            "speech" | "tts" => Some(Self::Speech),
            "claude" => Some(Self::Claude),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Reasoning => "reasoning",
            Self::Embedding => "embedding",
            Self::Transcription => "transcription",
            Self::Speech => "speech",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    /// Whether the family honors a `json_schema` structured-output envelope.
    pub fn supports_json_schema(&self) -> bool {
        matches!(self, Self::Chat | Self::Reasoning)
    }
}

/// Resolved configuration for one model alias. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub alias: String,
    pub family: ProviderFamily,
    pub api_url: String,
    pub api_token: String,
    pub auth_key_name: String,
    pub required_params: Vec<String>,
    pub model_id: String,
    pub context_window: Option<u32>,
    pub output_max: Option<u32>,
}

/// Read-only alias → model lookup.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
}

impl ModelRegistry {
    /// Build the registry from a config snapshot. Entries with an unknown
    /// family tag are dropped with a logged reason.
    pub fn from_config(config: &Config) -> Self {
        let mut models = HashMap::new();
        for entry in &config.models {
            match Self::build_entry(entry) {
                Some(mc) => {
                    models.insert(mc.alias.clone(), mc);
                }
                None => {
                    warn!(
                        alias = %entry.alias,
                        family = %entry.family,
                        "Dropping model entry with unknown provider family"
                    );
                }
            }
        }
        Self { models }
    }

    fn build_entry(entry: &ModelEntry) -> Option<ModelConfig> {
        let family = ProviderFamily::from_tag(&entry.family)?;
        Some(ModelConfig {
            alias: entry.alias.clone(),
            family,
            api_url: entry.api_url.clone(),
            api_token: entry.api_token.clone(),
            auth_key_name: entry.auth_key_name.clone(),
            required_params: entry.required_params.clone(),
            model_id: entry.model_id.clone(),
            context_window: entry.context_window,
            output_max: entry.output_max,
        })
    }

    /// Resolve an alias to its model configuration.
    pub fn resolve(&self, alias: &str) -> Result<&ModelConfig> {
        self.models
            .get(alias)
            .ok_or_else(|| GatewayError::UnsupportedModel(alias.to_string()))
    }

    pub fn has(&self, alias: &str) -> bool {
        self.models.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
