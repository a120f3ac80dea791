//! Audio adapters: multipart transcription and text-to-speech.
//!
//! Transcription accepts either a Base64 payload plus filename (decoded
//! into a scoped temporary file that is removed on every exit path) or a
//! direct file path. Speech sends JSON and receives binary audio, with the
//! response content-type deciding audio-vs-error.

use base64::Engine;
use serde_json::{json, Map, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::registry::ModelConfig;

use super::types::CallParams;
use super::{json_headers_with_auth, PreparedRequest, RequestBody, ResponseMode};

/// Optional multipart fields forwarded verbatim when the caller sets them.
const PASSTHROUGH_FIELDS: &[&str] = &["prompt", "initial_prompt"];

fn str_param<'a>(params: &'a CallParams, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Resolve the audio payload to upload.
///
/// Returns the bytes, the filename to present, and (for Base64 input) the
/// temp-file guard whose Drop removes the decoded file.
fn resolve_audio_input(
    params: &CallParams,
) -> Result<(Vec<u8>, String, Option<NamedTempFile>)> {
    if let (Some(b64), Some(file_name)) = (str_param(params, "fileBase64"), str_param(params, "fileName")) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|_| {
                GatewayError::MissingRequiredParameter(
                    "fileBase64 (failed to decode Base64 file data)".into(),
                )
            })?;

        let mut temp = NamedTempFile::new().map_err(|e| {
            GatewayError::Network(format!("failed to create temporary audio file: {e}"))
        })?;
        temp.write_all(&bytes).map_err(|e| {
            GatewayError::Network(format!("failed to write temporary audio file: {e}"))
        })?;
        debug!(path = %temp.path().display(), bytes = bytes.len(), "Decoded Base64 audio to temp file");

        return Ok((bytes, file_name.to_string(), Some(temp)));
    }

    if let Some(path) = str_param(params, "file") {
        let bytes = std::fs::read(path).map_err(|_| {
            GatewayError::MissingRequiredParameter(format!("file (not found: {path})"))
        })?;
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();
        return Ok((bytes, file_name, None));
    }

    Err(GatewayError::MissingRequiredParameter(
        "file (provide either a file path or Base64 data)".into(),
    ))
}

/// Prepare a multipart transcription request.
pub fn prepare_transcription(model: &ModelConfig, params: &CallParams) -> Result<PreparedRequest> {
    let (file_bytes, file_name, temp_file) = resolve_audio_input(params)?;

    let format = str_param(params, "format").unwrap_or("json").to_string();
    let mut fields = vec![
        ("language".to_string(), str_param(params, "language").unwrap_or("en").to_string()),
        ("temperature".to_string(), str_param(params, "temperature").unwrap_or("0.0").to_string()),
        ("format".to_string(), format.clone()),
    ];
    for name in PASSTHROUGH_FIELDS {
        if let Some(value) = str_param(params, name) {
            fields.push((name.to_string(), value.to_string()));
        }
    }

    let (url, mut headers) = json_headers_with_auth(model);
    // multipart body; reqwest supplies the boundary content-type
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));

    Ok(PreparedRequest {
        url,
        headers,
        body: RequestBody::Multipart { fields, file_name, file_bytes },
        response_mode: ResponseMode::TextOrJson(format),
        temp_file,
    })
}

/// Prepare a text-to-speech request.
pub fn prepare_speech(model: &ModelConfig, params: &CallParams) -> Result<PreparedRequest> {
    let input = str_param(params, "input")
        .ok_or_else(|| GatewayError::MissingRequiredParameter("input".into()))?;

    let mut body = Map::new();
    body.insert("model".into(), json!(model.model_id));
    body.insert("input".into(), json!(input));
    body.insert("voice".into(), json!(str_param(params, "voice").unwrap_or("alloy")));
    if let Some(instructions) = str_param(params, "instructions") {
        body.insert("instructions".into(), json!(instructions));
    }

    let (url, headers) = json_headers_with_auth(model);
    Ok(PreparedRequest {
        url,
        headers,
        body: RequestBody::Json(Value::Object(body)),
        response_mode: ResponseMode::AudioOrError,
        temp_file: None,
    })
}
