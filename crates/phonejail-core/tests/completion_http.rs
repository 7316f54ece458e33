//! HTTP behaviour of the OpenAI-compatible completion client.

use mockito::{Matcher, Server, ServerGuard};
use phonejail_core::{CompletionError, CompletionService, OpenAiCompletion};
use serde_json::json;

const PATH: &str = "/v1/chat/completions";

fn client(server: &ServerGuard) -> OpenAiCompletion {
    OpenAiCompletion::new(format!("{}{PATH}", server.url()), "test-key", "gpt-4")
}

fn reply_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_ok_response_returns_first_choice() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4",
            "max_tokens": 150,
            "messages": [{ "role": "system", "content": "the prompt" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(reply_body("Request denied."))
        .create_async()
        .await;

    let reply = client(&server).complete("the prompt", 0.7, 150).await.unwrap();
    assert_eq!(reply, "Request denied.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let cases = [
        (401, CompletionError::Unauthorized),
        (429, CompletionError::RateLimited),
        (500, CompletionError::Network("HTTP 500 Internal Server Error".into())),
    ];
    for (status, expected) in cases {
        let mut server = Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(status)
            .with_body("{}")
            .create_async()
            .await;

        let err = client(&server).complete("p", 0.7, 150).await.unwrap_err();
        assert_eq!(err, expected, "status {status}");
    }
}

#[test]
fn test_retryable_classification() {
    assert!(CompletionError::RateLimited.is_retryable());
    assert!(CompletionError::Network("x".into()).is_retryable());
    assert!(!CompletionError::Unauthorized.is_retryable());
    assert!(!CompletionError::InvalidResponse("x".into()).is_retryable());
}

#[tokio::test]
async fn test_empty_choices_is_invalid() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    let err = client(&server).complete("p", 0.7, 150).await.unwrap_err();
    assert!(matches!(err, CompletionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_garbage_body_is_invalid() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let err = client(&server).complete("p", 0.7, 150).await.unwrap_err();
    assert!(matches!(err, CompletionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let client = OpenAiCompletion::new("http://127.0.0.1:9/v1/chat/completions", "k", "gpt-4");
    let err = client.complete("p", 0.7, 150).await.unwrap_err();
    assert!(matches!(err, CompletionError::Network(_)));
}
