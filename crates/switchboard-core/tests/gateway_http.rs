//! End-to-end gateway tests over mocked providers.

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use switchboard_core::gateway::Gateway;
use switchboard_core::sanitize::PublicResponse;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn embedding_response_passes_through_unchanged() {
    let server = MockServer::start().await;
    let body = json!({
        "data": [{"embedding": [0.1, 0.2]}],
        "usage": {"prompt_tokens": 1, "total_tokens": 1}
    });
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "ada-002",
        "embedding",
        format!("{}/embeddings", server.uri()),
        &["input"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway
        .call_ai("ada-002", &params(r#"{"input": "hello"}"#), None)
        .await;
    match response {
        PublicResponse::Passthrough(value) => {
            // No content/role fields injected; bytes as the provider sent them
            assert_eq!(value, body);
            assert!(value.get("content").is_none());
            assert!(value.get("role").is_none());
        }
        other => panic!("expected passthrough, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_twice_then_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("made it")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "gpt-4o",
        "chat",
        format!("{}/chat/completions", server.uri()),
        &["messages"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway
        .call_ai(
            "gpt-4o",
            &params(r#"{"messages": [{"role": "user", "content": "hi"}]}"#),
            None,
        )
        .await;
    // 2 failed + 1 succeeded attempts observed by the mock (expect() above);
    // the caller sees only the success payload.
    assert_eq!(response.content().unwrap(), "made it");
}

#[tokio::test]
async fn missing_required_parameter_makes_no_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("nope")))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "gpt-4o",
        "chat",
        format!("{}/chat/completions", server.uri()),
        &["messages"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway.call_ai("gpt-4o", &params("{}"), None).await;
    // Sanitized polite error, not a raw kind or internal message
    let content = response.content().unwrap();
    assert!(content.contains("missing information"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_alias_is_polite_error() {
    let gateway = Gateway::new(Arc::new(config_with(vec![])));
    let response = gateway
        .call_ai("never-configured", &params(r#"{"messages": []}"#), None)
        .await;
    let content = response.content().unwrap();
    assert!(content.contains("isn't available"));
    assert!(!content.contains("never-configured"));
}

#[tokio::test]
async fn chat_call_sends_merged_params_and_query_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(query_param("api-key", "test-token"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-backend",
            "top_p": 0.9
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("merged")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "gpt-4o",
        "chat",
        format!("{}/chat/completions", server.uri()),
        &["messages"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway
        .call_ai(
            "gpt-4o",
            &params(r#"{"messages": [{"role": "user", "content": "hi"}]}"#),
            None,
        )
        .await;
    assert_eq!(response.content().unwrap(), "merged");
}

#[tokio::test]
async fn speech_audio_wrapped_as_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![7u8, 8, 9]),
        )
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "tts",
        "speech",
        format!("{}/speech", server.uri()),
        &["input"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway
        .call_ai("tts", &params(r#"{"input": "say hi"}"#), None)
        .await;
    match response {
        PublicResponse::Audio { audio_base64, content_type } => {
            assert_eq!(content_type, "audio/mpeg");
            assert_eq!(audio_base64, "BwgJ");
        }
        other => panic!("expected audio, got {other:?}"),
    }
}

#[tokio::test]
async fn speech_error_body_is_not_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/speech"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("content-type", "application/json")
                .set_body_json(json!({"error": {"message": "unknown voice"}})),
        )
        .mount(&server)
        .await;

    let config = config_with(vec![model_entry(
        "tts",
        "speech",
        format!("{}/speech", server.uri()),
        &["input"],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let response = gateway
        .call_ai("tts", &params(r#"{"input": "say hi"}"#), None)
        .await;
    // Surfaced as a sanitized error in the text shape, never raw JSON
    let content = response.content().unwrap();
    assert!(!content.contains("unknown voice"));
    assert!(matches!(response, PublicResponse::Text { .. }));
}

#[tokio::test]
async fn transcription_srt_returns_text_format() {
    let server = MockServer::start().await;
    let srt = "1\n00:00:00,000 --> 00:00:01,000\nhello world\n";
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(srt),
        )
        .mount(&server)
        .await;

    let audio = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(audio.path(), b"RIFFfake").unwrap();

    let config = config_with(vec![model_entry(
        "whisper",
        "transcription",
        format!("{}/transcribe", server.uri()),
        &[],
    )]);
    let gateway = Gateway::new(Arc::new(config));

    let raw = format!(
        r#"{{"file": "{}", "format": "srt"}}"#,
        audio.path().display()
    );
    let response = gateway.call_ai("whisper", &params(&raw), None).await;
    match response {
        PublicResponse::Transcript { text, format } => {
            assert_eq!(format, "srt");
            assert!(text.contains("hello world"));
        }
        other => panic!("expected transcript, got {other:?}"),
    }
}

#[tokio::test]
async fn claude_call_flattens_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/claude"))
        .and(body_partial_json(json!({
            "model_id": "claude-backend",
            "prompt_text": "User: hello"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"text": "bonjour"}],
            "role": "assistant",
            "model": "claude-backend",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut entry = model_entry("claude", "claude", format!("{}/claude", server.uri()), &["messages"]);
    entry.auth_key_name = "Ocp-Apim-Subscription-Key".into();
    let gateway = Gateway::new(Arc::new(config_with(vec![entry])));

    let response = gateway
        .call_ai(
            "claude",
            &params(r#"{"messages": [{"role": "user", "content": "hello"}]}"#),
            None,
        )
        .await;
    match response {
        PublicResponse::Text { content, usage, .. } => {
            assert_eq!(content, "bonjour");
            assert_eq!(usage.unwrap().total_tokens, 5);
        }
        other => panic!("expected text, got {other:?}"),
    }
}
