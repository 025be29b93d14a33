mod test_support;

use mockito::Matcher;
use reminder_module::service::ChatRelay;
use serde_json::{json, Value};

use test_support::{spawn_service, ServiceOptions};

async fn post_chat(base_url: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/chat", base_url))
        .json(body)
        .send()
        .await
        .expect("chat request")
}

#[tokio::test]
async fn chat_forwards_body_and_returns_upstream_json() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "gen-key".into()))
        .match_body(Matcher::PartialJson(
            json!({"contents": [{"parts": [{"text": "hi"}]}]}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let chat = ChatRelay::new(
        format!(
            "{}/v1beta/models/gemini-1.5-flash:generateContent",
            upstream.url()
        ),
        Some("gen-key".to_string()),
    )
    .unwrap();
    let service = spawn_service(ServiceOptions {
        chat,
        ..ServiceOptions::default()
    })
    .await;

    let response = post_chat(
        &service.base_url,
        &json!({"contents": [{"parts": [{"text": "hi"}]}]}),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], "hello");
    mock.assert_async().await;
}

#[tokio::test]
async fn upstream_failure_is_a_generic_500() {
    let mut upstream = mockito::Server::new_async().await;
    upstream
        .mock("POST", "/generate")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("quota exhausted for project 1234")
        .create_async()
        .await;

    let chat = ChatRelay::new(
        format!("{}/generate", upstream.url()),
        Some("gen-key".to_string()),
    )
    .unwrap();
    let service = spawn_service(ServiceOptions {
        chat,
        ..ServiceOptions::default()
    })
    .await;

    let response = post_chat(&service.base_url, &json!({"contents": []})).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "upstream returned an error");
    assert!(!body.to_string().contains("quota"));
}

#[tokio::test]
async fn missing_api_key_is_a_500() {
    let service = spawn_service(ServiceOptions::default()).await;
    let response = post_chat(&service.base_url, &json!({"contents": []})).await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "chat is not configured");
}
