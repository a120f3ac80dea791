//! Provider adapter layer.
//!
//! One adapter per provider family, all driven through a single closed
//! dispatch: `prepare` builds the provider-specific URL/headers/body from
//! normalized call parameters (pure, unit-testable), `send` performs the
//! network call, and `parse` turns the wire bytes into a family-native
//! `RawResponse`. `send_request` composes the three.

pub mod audio;
pub mod chat;
pub mod claude;
pub mod embedding;
pub mod gemini;
pub mod types;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::TuningDefaults;
use crate::error::{GatewayError, Result};
use crate::registry::{ModelConfig, ProviderFamily};
use types::CallParams;

/// A fully prepared outgoing request.
///
/// `temp_file` keeps a decoded audio upload alive until the request has
/// completed; dropping the guard removes the file on every exit path.
#[derive(Debug)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub response_mode: ResponseMode,
    pub temp_file: Option<NamedTempFile>,
}

/// Wire encoding of the request body.
#[derive(Debug)]
pub enum RequestBody {
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        file_name: String,
        file_bytes: Vec<u8>,
    },
}

/// How the response body must be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// Always JSON.
    Json,
    /// Audio bytes on success, a JSON error body otherwise; distinguished
    /// by the response content-type, never by status alone.
    AudioOrError,
    /// Plain-text subtypes (`srt`, `vtt`, `text`) arrive as raw text;
    /// `json` arrives as JSON.
    TextOrJson(String),
}

/// Provider-native response, before normalization.
#[derive(Debug, Clone)]
pub enum RawResponse {
    Json(Value),
    Audio { bytes: Vec<u8>, content_type: String },
    Text { body: String, format: String },
}

/// What came back over the wire, prior to any decoding decisions.
pub struct WireResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Decide credential placement from the configured auth-key name.
///
/// Vendor header prefixes (`ocp-…`, anything mentioning a subscription
/// key) select header placement; every other name goes on the query
/// string, which is the legacy placement the oldest deployments expect.
pub fn auth_in_header(auth_key_name: &str) -> bool {
    let lower = auth_key_name.to_lowercase();
    lower.starts_with("ocp-") || lower.contains("subscription")
}

/// Append `key=value` to a URL, respecting an existing query string.
pub fn append_query_auth(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={value}")
}

/// Standard JSON headers plus credential placement for one model.
/// Returns the final URL and header list.
pub(crate) fn json_headers_with_auth(model: &ModelConfig) -> (String, Vec<(String, String)>) {
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ];
    if auth_in_header(&model.auth_key_name) {
        headers.push((model.auth_key_name.clone(), model.api_token.clone()));
        (model.api_url.clone(), headers)
    } else {
        let url = append_query_auth(&model.api_url, &model.auth_key_name, &model.api_token);
        (url, headers)
    }
}

/// Build the provider-specific request for one call.
pub fn prepare(
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<PreparedRequest> {
    match model.family {
        ProviderFamily::Chat => chat::prepare_chat(model, defaults, params),
        ProviderFamily::Reasoning => chat::prepare_reasoning(model, defaults, params),
        ProviderFamily::Embedding => embedding::prepare(model, params),
        ProviderFamily::Transcription => audio::prepare_transcription(model, params),
        ProviderFamily::Speech => audio::prepare_speech(model, params),
        ProviderFamily::Claude => claude::prepare(model, defaults, params),
        ProviderFamily::Gemini => gemini::prepare(model, defaults, params),
    }
}

/// Perform the network call for a prepared request.
pub async fn send(client: &reqwest::Client, prepared: &PreparedRequest) -> Result<WireResponse> {
    let mut request = client.post(&prepared.url);
    for (name, value) in &prepared.headers {
        // reqwest sets multipart content-type itself, boundary included.
        if matches!(prepared.body, RequestBody::Multipart { .. })
            && name.eq_ignore_ascii_case("content-type")
        {
            continue;
        }
        request = request.header(name.as_str(), value.as_str());
    }

    request = match &prepared.body {
        RequestBody::Json(value) => request.json(value),
        RequestBody::Multipart { fields, file_name, file_bytes } => {
            let mut form = reqwest::multipart::Form::new();
            for (name, value) in fields {
                form = form.text(name.clone(), value.clone());
            }
            let part = reqwest::multipart::Part::bytes(file_bytes.clone())
                .file_name(file_name.clone());
            form = form.part("file", part);
            request.multipart(form)
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::Network(format!("request failed: {e}")))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Network(format!("failed to read response body: {e}")))?
        .to_vec();

    debug!(status, content_type = %content_type, bytes = body.len(), "Provider response received");
    Ok(WireResponse { status, content_type, body })
}

/// Decode the wire response according to the expected response mode.
pub fn parse(wire: WireResponse, mode: &ResponseMode) -> Result<RawResponse> {
    // Speech endpoints signal success by content-type; everything else
    // must come back 2xx before the body is worth decoding.
    if *mode != ResponseMode::AudioOrError && !(200..300).contains(&(wire.status as usize)) {
        let snippet = String::from_utf8_lossy(&wire.body);
        let snippet = snippet.chars().take(500).collect::<String>();
        return Err(GatewayError::Network(format!(
            "HTTP error: {} - Response: {}",
            wire.status, snippet
        )));
    }

    match mode {
        ResponseMode::Json => decode_json(&wire.body).map(RawResponse::Json),
        ResponseMode::AudioOrError => {
            if wire.content_type.to_lowercase().contains("audio") && !wire.body.is_empty() {
                Ok(RawResponse::Audio { bytes: wire.body, content_type: wire.content_type })
            } else {
                let detail = match decode_json(&wire.body) {
                    Ok(value) => value.to_string(),
                    Err(_) => String::from_utf8_lossy(&wire.body).chars().take(500).collect(),
                };
                warn!(status = wire.status, "Speech provider returned a non-audio body");
                Err(GatewayError::Network(format!(
                    "speech provider error ({}): {}",
                    wire.status, detail
                )))
            }
        }
        ResponseMode::TextOrJson(format) => {
            if format == "json" {
                decode_json(&wire.body).map(RawResponse::Json)
            } else {
                let body = String::from_utf8_lossy(&wire.body).to_string();
                Ok(RawResponse::Text { body, format: format.clone() })
            }
        }
    }
}

fn decode_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| {
        GatewayError::ResponseDecode(format!(
            "provider returned malformed JSON: {e}"
        ))
    })
}

/// Compose prepare → send → parse for one attempt against one model.
pub async fn send_request(
    client: &reqwest::Client,
    model: &ModelConfig,
    defaults: &TuningDefaults,
    params: &CallParams,
) -> Result<RawResponse> {
    let prepared = prepare(model, defaults, params)?;
    debug!(alias = %model.alias, family = model.family.as_str(), url = %prepared.url, "Sending provider request");
    let wire = send(client, &prepared).await?;
    // `prepared` (and any temp file it guards) lives until here on success
    // and is dropped by unwinding on every error path above.
    parse(wire, &prepared.response_mode)
}
