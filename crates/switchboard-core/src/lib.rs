//! switchboard-core: the model gateway library.
//!
//! One abstract chat/completion request goes in; one normalized result
//! comes out, whichever of the heterogeneous LLM or speech providers
//! served it. The building blocks:
//!
//! - [`config`] — Typed configuration loading from JSON, one immutable snapshot per process
//! - [`registry`] — Alias → model configuration lookup with a closed provider-family set
//! - [`provider`] — Per-family request adapters (chat, reasoning, embeddings, audio, Claude, Gemini)
//! - [`normalize`] — Provider-native responses mapped into one common shape
//! - [`budget`] — Per-call completion-token budgeting
//! - [`retry`] — Bounded full-attempt retries with typed terminal errors
//! - [`agent`] — The multi-step tool-calling loop with its safety limits
//! - [`tools`] — Declarative tool catalog, validation, and dispatch contracts
//! - [`sanitize`] — The final gate: every caller sees clean text or a polite error
//! - [`gateway`] — The `call_ai` entry point tying it all together
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard_core::config::Config;
//! use switchboard_core::gateway::Gateway;
//!
//! # async fn example() {
//! let config = Arc::new(Config::load().unwrap());
//! let gateway = Gateway::new(config);
//!
//! let params = serde_json::from_str(
//!     r#"{"messages": [{"role": "user", "content": "hello"}]}"#,
//! ).unwrap();
//! let response = gateway.call_ai("gpt-4o", &params, None).await;
//! println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! # }
//! ```

pub mod agent;
pub mod budget;
pub mod config;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod sanitize;
pub mod tools;

pub use error::{GatewayError, Result};
pub use gateway::{CallLogSink, CallRecord, CallerContext, Gateway, ToolSource};
pub use sanitize::PublicResponse;
