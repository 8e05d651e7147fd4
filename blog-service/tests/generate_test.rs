mod common;

use axum::http::StatusCode;
use blog_service::config::BlogConfig;
use blog_service::handlers::generate::MAX_OUTPUT_TOKENS;
use blog_service::services::providers::mock::MockTextProvider;
use common::{
    generate_request, raw_generate_request, read_json, test_router_with, valid_payload, CALLER,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

/// Router whose limiter never gets in the way of validation tests.
fn lenient_router(provider: Arc<MockTextProvider>) -> axum::Router {
    let mut config = BlogConfig::for_tests();
    config.rate_limit.requests = 1_000;
    test_router_with(config, provider)
}

async fn post(provider: &Arc<MockTextProvider>, body: &Value) -> (StatusCode, Value) {
    let response = lenient_router(provider.clone())
        .oneshot(generate_request(body, CALLER))
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

#[tokio::test]
async fn valid_request_returns_trimmed_generated_text() {
    let provider = Arc::new(MockTextProvider::replying("  Hello <h1>World</h1>  "));

    let (status, body) = post(&provider, &valid_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "generated_text": "Hello <h1>World</h1>" }));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn provider_receives_rendered_prompt_and_token_cap() {
    let provider = Arc::new(MockTextProvider::echo());

    let (status, _) = post(&provider, &valid_payload()).await;
    assert_eq!(status, StatusCode::OK);

    let prompt = provider.last_prompt().expect("provider was not called");
    assert!(prompt.starts_with("Write a listicle blog post targeted at homeowners"));
    assert!(prompt.contains("on the topic of gardening, spring"));
    assert!(prompt.contains("500 words long"));
    assert!(prompt.contains("friendly tone"));
    assert!(prompt.contains("include the following points: ."));
    assert!(prompt.ends_with("<tr>, <th>, <td>)."));

    let params = provider.last_params().unwrap();
    assert_eq!(params.max_tokens, Some(MAX_OUTPUT_TOKENS));
    assert_eq!(MAX_OUTPUT_TOKENS, 2048);
}

#[tokio::test]
async fn additional_instructions_reach_the_prompt() {
    let provider = Arc::new(MockTextProvider::echo());
    let mut payload = valid_payload();
    payload["additional_instructions"] = json!(["list tools", "add a FAQ"]);

    let (status, _) = post(&provider, &payload).await;
    assert_eq!(status, StatusCode::OK);

    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.contains("include the following points: list tools, add a FAQ."));
}

#[tokio::test]
async fn missing_any_required_field_is_rejected() {
    let provider = Arc::new(MockTextProvider::echo());

    for field in blog_service::models::REQUIRED_FIELDS {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove(field);

        let (status, body) = post(&provider, &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {field}");
        assert_eq!(
            body["message"],
            "Validation failed: Missing parameters in request"
        );
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn invalid_keywords_are_rejected() {
    let provider = Arc::new(MockTextProvider::echo());

    for keywords in [json!([]), json!("gardening"), json!(7)] {
        let mut payload = valid_payload();
        payload["keywords"] = keywords;

        let (status, body) = post(&provider, &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Validation failed: Keywords should be a list with at least one keyword"
        );
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn invalid_blog_length_is_rejected() {
    let provider = Arc::new(MockTextProvider::echo());

    for length in [json!(0), json!(-3), json!("five"), json!(2.5)] {
        let mut payload = valid_payload();
        payload["blog_length"] = length;

        let (status, body) = post(&provider, &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Validation failed: Blog length should be a positive integer"
        );
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn non_list_additional_instructions_are_rejected() {
    let provider = Arc::new(MockTextProvider::echo());
    let mut payload = valid_payload();
    payload["additional_instructions"] = json!("be concise");

    let (status, body) = post(&provider, &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Validation failed: Additional instructions should be a list"
    );
}

#[tokio::test]
async fn non_alphanumeric_tone_is_rejected() {
    let provider = Arc::new(MockTextProvider::echo());

    for tone in ["very friendly", "friendly!", "<script>"] {
        let mut payload = valid_payload();
        payload["tone"] = json!(tone);

        let (status, body) = post(&provider, &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed: Tone should be alphanumeric");
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn empty_tone_is_accepted() {
    let provider = Arc::new(MockTextProvider::echo());
    let mut payload = valid_payload();
    payload["tone"] = json!("");

    let (status, _) = post(&provider, &payload).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_json_content_type_is_missing_json() {
    let provider = Arc::new(MockTextProvider::echo());
    let app = lenient_router(provider.clone());

    let response = app
        .oneshot(raw_generate_request(
            valid_payload().to_string(),
            Some("text/plain"),
            CALLER,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        json!({ "message": "Missing JSON in request" })
    );
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn missing_content_type_is_missing_json() {
    let provider = Arc::new(MockTextProvider::echo());
    let app = lenient_router(provider);

    let response = app
        .oneshot(raw_generate_request(valid_payload().to_string(), None, CALLER))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["message"], "Missing JSON in request");
}

#[tokio::test]
async fn unparseable_body_is_missing_json() {
    let provider = Arc::new(MockTextProvider::echo());
    let app = lenient_router(provider);

    let response = app
        .oneshot(raw_generate_request(
            "{\"content_type\": ",
            Some("application/json"),
            CALLER,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["message"], "Missing JSON in request");
}

#[tokio::test]
async fn provider_failure_returns_generic_error() {
    let provider = Arc::new(MockTextProvider::failing(
        "401 Unauthorized: Incorrect API key provided: sk-live-abc",
    ));

    let (status, body) = post(&provider, &valid_payload()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Error generating text" }));
    assert!(!body.to_string().contains("sk-live"));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let provider = Arc::new(MockTextProvider::echo());
    let response = lenient_router(provider)
        .oneshot(generate_request(&valid_payload(), CALLER))
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn cors_advertises_only_configured_origin() {
    let provider = Arc::new(MockTextProvider::echo());
    let app = lenient_router(provider);

    let mut allowed = generate_request(&valid_payload(), CALLER);
    allowed
        .headers_mut()
        .insert("origin", "https://comfyworkspace.com".parse().unwrap());
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://comfyworkspace.com"
    );

    let mut other = generate_request(&valid_payload(), CALLER);
    other
        .headers_mut()
        .insert("origin", "https://evil.example".parse().unwrap());
    let response = app.oneshot(other).await.unwrap();
    assert_ne!(
        response.headers()["access-control-allow-origin"],
        "https://evil.example"
    );
}

#[tokio::test]
async fn oversized_body_is_rejected_with_json_message() {
    let provider = Arc::new(MockTextProvider::echo());
    let mut payload = valid_payload();
    payload["additional_instructions"] = json!(["x".repeat(3 * 1024 * 1024)]);

    let (status, body) = post(&provider, &payload).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "message": "Request body too large" }));
    assert_eq!(provider.call_count(), 0);
}
