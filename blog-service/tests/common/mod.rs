//! Shared helpers for blog-service integration tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use blog_service::{build_router, config::BlogConfig, AppState};
use blog_service::services::providers::{mock::MockTextProvider, TextProvider};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

pub const CALLER: &str = "198.51.100.7:50000";

/// Router over `provider` with the default 5 requests / 60 s limit.
pub fn test_router(provider: Arc<MockTextProvider>) -> Router {
    test_router_with(BlogConfig::for_tests(), provider)
}

pub fn test_router_with(config: BlogConfig, provider: Arc<MockTextProvider>) -> Router {
    let provider: Arc<dyn TextProvider> = provider;
    let state = AppState::new(config, provider).expect("Failed to build state");
    build_router(state).expect("Failed to build router")
}

/// Payload that passes every validation rule.
pub fn valid_payload() -> Value {
    json!({
        "content_type": "listicle",
        "target_audience": "homeowners",
        "keywords": ["gardening", "spring"],
        "blog_length": 500,
        "tone": "friendly"
    })
}

/// JSON `POST /generate` from `caller`.
pub fn generate_request(body: &Value, caller: &str) -> Request<Body> {
    raw_generate_request(body.to_string(), Some("application/json"), caller)
}

pub fn raw_generate_request(
    body: impl Into<String>,
    content_type: Option<&str>,
    caller: &str,
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/generate");
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }

    let mut request = builder.body(Body::from(body.into())).unwrap();
    let addr: SocketAddr = caller.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
