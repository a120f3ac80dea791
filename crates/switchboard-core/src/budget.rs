//! Completion-token budgeting.
//!
//! Computes, per call, how many completion tokens to request and which
//! request field carries the value. Prompt size is estimated with the
//! `chars / 4 ≈ tokens` heuristic; the estimate plus a safety buffer is
//! subtracted from the model's context window and the result is clamped
//! into `[1024, output_max]`. Never cached: prompt length varies per call.

use crate::registry::{ModelConfig, ProviderFamily};

/// Floor for the computed budget. A prompt that already overflows the
/// context window still yields this, never a negative value.
pub const MIN_COMPLETION_TOKENS: u32 = 1024;

/// Fallback ceiling for models with no configured limits.
pub const DEFAULT_OUTPUT_MAX: u32 = 4096;

/// Tokens reserved against estimation error and provider overhead.
const SAFETY_BUFFER: u32 = 512;

/// One computed budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBudget {
    /// Request field that receives the value. Reasoning-tier providers
    /// renamed the parameter in their newer API.
    pub param_name: &'static str,
    pub max_value: u32,
    pub estimated_prompt_tokens: u32,
}

/// Estimate prompt tokens from character count.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() / 4).max(1)) as u32
}

/// Which request field carries the completion budget for this family.
pub fn completion_param_name(family: ProviderFamily) -> &'static str {
    match family {
        ProviderFamily::Reasoning => "max_completion_tokens",
        _ => "max_tokens",
    }
}

/// Compute the completion-token budget for one call.
pub fn compute_budget(model: &ModelConfig, prompt_text: &str) -> TokenBudget {
    let estimated = estimate_tokens(prompt_text);
    let output_max = model.output_max.unwrap_or(DEFAULT_OUTPUT_MAX).max(MIN_COMPLETION_TOKENS);

    let max_value = match model.context_window {
        Some(window) => {
            let available = window.saturating_sub(estimated).saturating_sub(SAFETY_BUFFER);
            available.clamp(MIN_COMPLETION_TOKENS, output_max)
        }
        // Unknown model limits: fixed conservative default.
        None => output_max.min(DEFAULT_OUTPUT_MAX),
    };

    TokenBudget {
        param_name: completion_param_name(model.family),
        max_value,
        estimated_prompt_tokens: estimated,
    }
}
