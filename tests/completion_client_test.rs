use std::time::Duration;

use garden_assistant::constants::WARNING_MARKER;
use garden_assistant::conversation::Turn;
use garden_assistant::llm_interaction::{ChatCompletionClient, CompletionError};
use garden_assistant::prompt::{PromptAssembler, PromptRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ChatCompletionClient {
    ChatCompletionClient::new(
        reqwest::Client::new(),
        server.uri(),
        "test-openrouter-key",
        "http://localhost:8501",
        "Gardening Assistant",
    )
}

fn request() -> PromptRequest {
    PromptAssembler::default().assemble(
        &[
            Turn::assistant("Hello!"),
            Turn::user("How often should I water tomatoes?"),
        ],
        None,
    )
}

fn reply(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[test_log::test(tokio::test)]
async fn test_complete_sends_headers_and_body() {
    let server = MockServer::start().await;
    let request = request();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-openrouter-key"))
        .and(header("HTTP-Referer", "http://localhost:8501"))
        .and(header("X-Title", "Gardening Assistant"))
        .and(body_json(serde_json::to_value(&request).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("  Water deeply twice a week.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client_for(&server).complete(&request).await.unwrap();
    assert_eq!(answer, "Water deeply twice a week.");
}

#[tokio::test]
async fn test_request_body_has_expected_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
        .mount(&server)
        .await;

    client_for(&server).complete(&request()).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = received[0].body_json().unwrap();
    assert_eq!(body["model"], "openai/gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 500);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][2]["content"], "How often should I water tomatoes?");
}

#[tokio::test]
async fn test_error_status_is_distinguishable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    match client_for(&server).complete(&request()).await {
        Err(CompletionError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    assert!(matches!(
        client_for(&server).complete(&request()).await,
        Err(CompletionError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_complete_or_warning_never_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let answer = client_for(&server).complete_or_warning(&request()).await;
    assert!(answer.starts_with(WARNING_MARKER), "{}", answer);
    assert!(answer.contains("401"), "{}", answer);
}

#[tokio::test]
async fn test_malformed_json_becomes_warning() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("definitely not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.complete(&request()).await,
        Err(CompletionError::Transport(_))
    ));
    assert!(client
        .complete_or_warning(&request())
        .await
        .starts_with(WARNING_MARKER));
}

#[tokio::test]
async fn test_slow_completion_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply("too late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).with_timeout(Duration::from_millis(100));
    assert!(matches!(
        client.complete(&request()).await,
        Err(CompletionError::Transport(e)) if e.is_timeout()
    ));
}
