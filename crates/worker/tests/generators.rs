use std::time::Duration;

use assert_matches::assert_matches;
use codevoice_core::generation::{GenerationKind, GenerationRequest};
use codevoice_worker::generator::{GeminiGenerator, GroqGenerator};
use codevoice_worker::{GenerationError, Generator};
use mockito::Matcher;

fn request(kind: GenerationKind) -> GenerationRequest {
    let mut request = GenerationRequest::new(kind, "hello world app");
    if kind.requires_code() {
        request.code = Some("print('hi')".into());
    }
    request
}

fn gemini_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_gemini_fenced_json_is_parsed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::Regex("hello world app".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("```json\n{\"code\": \"print('hello')\"}\n```"))
        .create_async()
        .await;

    let generator =
        GeminiGenerator::new(server.url(), "test-key", "gemini-2.0-flash", Duration::from_secs(5))
            .unwrap();
    let result = generator.generate(&request(GenerationKind::Generate)).await.unwrap();

    assert_eq!(result["code"], "print('hello')");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_prose_is_wrapped() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Any)
        .with_status(200)
        .with_body(gemini_body("It prints hi."))
        .create_async()
        .await;

    let generator =
        GeminiGenerator::new(server.url(), "k", "gemini-2.0-flash", Duration::from_secs(5)).unwrap();
    let result = generator.generate(&request(GenerationKind::Explain)).await.unwrap();

    assert_eq!(result, serde_json::json!({"text": "It prints hi."}));
}

#[tokio::test]
async fn test_gemini_http_error_is_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", Matcher::Any)
        .with_status(429)
        .with_body("{\"error\":{\"message\":\"quota\"}}")
        .create_async()
        .await;

    let generator =
        GeminiGenerator::new(server.url(), "k", "gemini-2.0-flash", Duration::from_secs(5)).unwrap();
    let err = generator
        .generate(&request(GenerationKind::Generate))
        .await
        .unwrap_err();

    assert_matches!(err, GenerationError::Api { status: 429, ref body } if body.contains("quota"));
}

#[tokio::test]
async fn test_groq_project_requires_json_object() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/openai/v1/chat/completions")
        .match_header("authorization", "Bearer gsk_test")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Here you go!" } }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let generator = GroqGenerator::new(
        server.url(),
        "gsk_test",
        "llama-3.3-70b-versatile",
        Duration::from_secs(5),
    )
    .unwrap();
    let err = generator
        .generate(&request(GenerationKind::Project))
        .await
        .unwrap_err();

    assert_matches!(err, GenerationError::MalformedResponse(_));
}

#[tokio::test]
async fn test_groq_sends_model_and_returns_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/v1/chat/completions")
        .match_body(Matcher::PartialJson(
            serde_json::json!({ "model": "llama-3.3-70b-versatile" }),
        ))
        .with_status(200)
        .with_body(
            serde_json::json!({
                "choices": [{ "message": { "content": "{\"issues\": [\"off by one\"]}" } }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let generator = GroqGenerator::new(
        server.url(),
        "gsk_test",
        "llama-3.3-70b-versatile",
        Duration::from_secs(5),
    )
    .unwrap();
    let result = generator.generate(&request(GenerationKind::Debug)).await.unwrap();

    assert_eq!(result["issues"][0], "off by one");
    mock.assert_async().await;
}
