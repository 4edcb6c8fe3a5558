use std::time::Duration;

use serde_json::json;
use topic_digest::config::{DigestConfig, PerplexityConfig};
use topic_digest::{DigestError, DigestMode, PerplexityClient, UpdateSource};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, mode: DigestMode) -> PerplexityClient {
    let config = PerplexityConfig {
        api_key: Some("pplx-test".to_string()),
        endpoint: format!("{}/chat/completions", server.uri()),
        ..Default::default()
    };
    let digest = DigestConfig {
        mode,
        ..Default::default()
    };
    PerplexityClient::new(&config, &digest).unwrap()
}

#[tokio::test]
async fn fetch_sends_prompt_and_parses_citations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer pplx-test"))
        .and(body_partial_json(json!({
            "model": "sonar",
            "max_tokens": 150,
            "temperature": 0.3,
            "return_citations": true
        })))
        .and(body_string_contains("most important developments and news in FastAPI?"))
        .and(body_string_contains("strict tech change-log generator"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "• FastAPI 0.115 released [1]\n• Starlette 0.40 released [2]"
                }
            }],
            "citations": [
                "https://www.fastapi.tiangolo.com/release-notes/",
                "https://github.com/encode/starlette/releases"
            ],
            "usage": {"prompt_tokens": 210, "completion_tokens": 42, "total_tokens": 252}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, DigestMode::Daily);
    let update = client.fetch("FastAPI").await.unwrap();

    assert_eq!(
        update.response_text,
        "• FastAPI 0.115 released [1]\n• Starlette 0.40 released [2]"
    );
    assert_eq!(update.citations.len(), 2);
    assert_eq!(update.citations[1], "https://github.com/encode/starlette/releases");
}

#[tokio::test]
async fn weekly_mode_uses_weekly_bounds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 400})))
        .and(body_string_contains("Output ONLY 5–8 bullet points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "No real updates for June 08, 2025"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, DigestMode::Weekly);
    let update = client.fetch("Agentic AI").await.unwrap();

    assert_eq!(update.response_text, "No real updates for June 08, 2025");
    assert!(update.citations.is_empty());
}

#[tokio::test]
async fn non_success_status_is_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, DigestMode::Daily);
    let err = client.fetch("Python").await.unwrap_err();

    assert!(matches!(err, DigestError::Fetch(_)));
    assert!(err.message().contains("401"));
    assert!(err.message().contains("invalid api key"));
}

#[tokio::test]
async fn missing_completion_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "citations": ["https://example.com"]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, DigestMode::Daily);
    let err = client.fetch("Python").await.unwrap_err();

    assert!(matches!(err, DigestError::Parse(_)));
}

#[tokio::test]
async fn non_json_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, DigestMode::Daily);
    let err = client.fetch("Python").await.unwrap_err();

    assert!(matches!(err, DigestError::Parse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_fetch_error() {
    let config = PerplexityConfig {
        api_key: Some("pplx-test".to_string()),
        endpoint: "http://127.0.0.1:9/chat/completions".to_string(),
        timeout_secs: 2,
        ..Default::default()
    };
    let client = PerplexityClient::new(&config, &DigestConfig::default()).unwrap();

    let err = client.fetch("Python").await.unwrap_err();
    assert!(matches!(err, DigestError::Fetch(_)));
}

#[tokio::test]
async fn slow_response_is_fetch_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "late"}}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = PerplexityConfig {
        api_key: Some("pplx-test".to_string()),
        endpoint: format!("{}/chat/completions", server.uri()),
        timeout_secs: 1,
        ..Default::default()
    };
    let client = PerplexityClient::new(&config, &DigestConfig::default()).unwrap();

    let err = client.fetch("Python").await.unwrap_err();
    assert!(matches!(err, DigestError::Fetch(_)));
    assert_eq!(err.message(), "Perplexity API request timed out");
}
