//! switchboard CLI — one-shot calls, interactive chat, and status commands.
//!
//! Usage:
//!   switchboard ask "question"      — One-shot chat call
//!   switchboard chat                — Interactive chat session
//!   switchboard embed "text"        — Embedding call (raw JSON out)
//!   switchboard transcribe f.wav    — Audio transcription
//!   switchboard speak "text"        — Text-to-speech (writes an audio file)
//!   switchboard status              — Show configured models and limits
//!   switchboard onboard             — Create a default configuration

use anyhow::{Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

use switchboard_core::config::Config;
use switchboard_core::gateway::{CallLogSink, CallRecord, CallerContext, Gateway};
use switchboard_core::sanitize::PublicResponse;

#[derive(Parser)]
#[command(
    name = "switchboard",
    version,
    about = "A single gateway for heterogeneous LLM and speech providers",
    long_about = "switchboard — one normalized door to many model APIs.\n\nConfigure model aliases once, then call chat, embedding, transcription, and speech endpoints through a single interface, with optional agentic tool calling."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The prompt text
        prompt: String,

        /// Model alias (default: first configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Run in agent mode with the configured tool catalog
        #[arg(short, long)]
        agent: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Model alias (default: first configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Run in agent mode with the configured tool catalog
        #[arg(short, long)]
        agent: bool,
    },

    /// Embed text and print the raw provider response
    Embed {
        /// The input text
        input: String,

        /// Model alias
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Transcribe an audio file
    Transcribe {
        /// Path to the audio file
        file: String,

        /// Model alias
        #[arg(short, long)]
        model: Option<String>,

        /// Response format: json, text, srt, or vtt
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Synthesize speech and write the audio to a file
    Speak {
        /// The text to speak
        input: String,

        /// Model alias
        #[arg(short, long)]
        model: Option<String>,

        /// Voice name
        #[arg(short, long, default_value = "alloy")]
        voice: String,

        /// Output file path
        #[arg(short, long, default_value = "speech.mp3")]
        out: String,
    },

    /// Show configured models and agent limits
    Status,

    /// Create or reset the default configuration
    Onboard,
}

/// Audit sink that mirrors every interaction into the tracing log.
struct TracingLogSink;

impl CallLogSink for TracingLogSink {
    fn record(&self, record: &CallRecord) {
        info!(
            alias = %record.alias,
            project = record.project_id.as_deref().unwrap_or("-"),
            outcome = %record.outcome,
            "call logged"
        );
    }
}

fn pick_model(config: &Config, requested: Option<String>) -> Result<String> {
    if let Some(model) = requested {
        return Ok(model);
    }
    config
        .models
        .first()
        .map(|m| m.alias.clone())
        .context("no models configured; run `switchboard onboard` first")
}

fn chat_params(prompt: &str, agent: bool) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "messages".into(),
        json!([{"role": "user", "content": prompt}]),
    );
    if agent {
        params.insert("agent_mode".into(), json!(true));
    }
    params
}

fn print_text_response(response: &PublicResponse) {
    match response {
        PublicResponse::Text { content, tools_used, .. } => {
            if !tools_used.is_empty() {
                let names: Vec<&str> = tools_used.iter().map(|t| t.name.as_str()).collect();
                println!("[tools: {}]", names.join(", "));
            }
            println!("{content}");
        }
        other => {
            println!("{}", serde_json::to_string_pretty(other).unwrap_or_default());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchboard=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Onboard = cli.command {
        let path = Config::write_default_template()?;
        println!("Wrote starter configuration to {}", path.display());
        println!("Edit it to add your model endpoints and tokens.");
        return Ok(());
    }

    let config = Arc::new(Config::load()?);
    let gateway = Gateway::new(config.clone()).with_log_sink(Arc::new(TracingLogSink));
    let caller = CallerContext { project_id: None };

    match cli.command {
        Commands::Ask { prompt, model, agent } => {
            let alias = pick_model(&config, model)?;
            let response = gateway
                .call_ai(&alias, &chat_params(&prompt, agent), Some(&caller))
                .await;
            print_text_response(&response);
        }

        Commands::Chat { model, agent } => {
            let alias = pick_model(&config, model)?;
            println!("Chatting with {alias} (ctrl-d to exit)");
            let stdin = io::stdin();
            let mut history: Vec<Value> = Vec::new();
            loop {
                print!("> ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                history.push(json!({"role": "user", "content": line}));

                let mut params = Map::new();
                params.insert("messages".into(), Value::Array(history.clone()));
                if agent {
                    params.insert("agent_mode".into(), json!(true));
                }

                let response = gateway.call_ai(&alias, &params, Some(&caller)).await;
                print_text_response(&response);
                if let PublicResponse::Text { content, .. } = &response {
                    history.push(json!({"role": "assistant", "content": content}));
                }
            }
        }

        Commands::Embed { input, model } => {
            let alias = pick_model(&config, model)?;
            let mut params = Map::new();
            params.insert("input".into(), json!(input));
            let response = gateway.call_ai(&alias, &params, Some(&caller)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Transcribe { file, model, format } => {
            let alias = pick_model(&config, model)?;
            let mut params = Map::new();
            params.insert("file".into(), json!(file));
            params.insert("format".into(), json!(format));
            let response = gateway.call_ai(&alias, &params, Some(&caller)).await;
            match &response {
                PublicResponse::Transcript { text, .. } => println!("{text}"),
                other => println!("{}", serde_json::to_string_pretty(other)?),
            }
        }

        Commands::Speak { input, model, voice, out } => {
            let alias = pick_model(&config, model)?;
            let mut params = Map::new();
            params.insert("input".into(), json!(input));
            params.insert("voice".into(), json!(voice));
            let response = gateway.call_ai(&alias, &params, Some(&caller)).await;
            match &response {
                PublicResponse::Audio { audio_base64, content_type } => {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(audio_base64)
                        .context("gateway returned undecodable audio")?;
                    std::fs::write(&out, &bytes)?;
                    println!("Wrote {} bytes ({content_type}) to {out}", bytes.len());
                }
                other => print_text_response(other),
            }
        }

        Commands::Status => {
            println!("Config: {}", Config::default_path().display());
            if config.models.is_empty() {
                println!("No models configured. Run `switchboard onboard`.");
            } else {
                println!("Models:");
                for m in &config.models {
                    println!("  {:<16} family={:<14} {}", m.alias, m.family, m.api_url);
                }
            }
            println!(
                "Agent limits: max_steps={} max_tools={} timeout={}s result_cap={} chars",
                config.agent.max_steps,
                config.agent.max_tools_per_run,
                config.agent.timeout_seconds,
                config.agent.max_tool_result_chars
            );
            println!("Tools configured: {}", config.tools.len());
        }

        Commands::Onboard => unreachable!("handled above"),
    }

    Ok(())
}
