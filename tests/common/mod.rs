//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use auth_gateway::config::GatewayConfig;
use auth_gateway::http::{build_router, AppState};

pub const SECRET: &str = "test_secret";
pub const API_KEY: &str = "test_api_key";

/// Defaults with every secret set and no proxy between us and the mocks.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.signed_token.secret = SECRET.to_string();
    config.api_key.valid_key = API_KEY.to_string();
    config.upstream.use_system_proxy = false;
    config.upstream.timeout_secs = 2;
    config
}

pub fn test_config_with_introspection(url: String) -> GatewayConfig {
    let mut config = test_config();
    config.introspection.url = Some(url);
    config
}

pub fn router(config: GatewayConfig) -> (Router, AppState) {
    let state = AppState::new(std::sync::Arc::new(config)).expect("state builds");
    (build_router(state.clone()), state)
}

/// A GET request from a fixed client address.
pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-real-ip", "203.0.113.10")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn cache_header(&self) -> Option<&str> {
        self.headers
            .get("x-token-cache")
            .and_then(|v| v.to_str().ok())
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub async fn send(router: &Router, request: axum::http::request::Builder) -> TestResponse {
    let request = request.body(Body::empty()).expect("request builds");
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}
