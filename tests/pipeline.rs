//! End-to-end request pipeline tests: rate limiting, credential extraction,
//! every strategy, and the token cache header.

mod common;

use std::time::Duration;

use axum::http::{Request, StatusCode};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{get, router, send, test_config, test_config_with_introspection, API_KEY};

async fn introspection_mock(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn upstream_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_ping_and_health_need_no_credential() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/ping")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "message": "pong" }));
    assert!(res.headers.contains_key("x-request-id"));

    let res = send(&app, get("/api/v1/health")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/apikey/profile")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.error().to_lowercase().contains("missing"));
    assert!(res.cache_header().is_none());
}

#[tokio::test]
async fn test_api_key_resolves_service_principal() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body,
        json!({ "id": "api_user", "email": "api@example.com", "name": "API User" })
    );

    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", "wrong")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid API key");
}

#[tokio::test]
async fn test_unset_api_key_is_a_server_error() {
    let mut config = test_config();
    config.api_key.valid_key.clear();
    let (app, _) = router(config);

    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", "anything")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error(), "Authentication is not configured");
}

#[tokio::test]
async fn test_minted_token_authenticates_jwt_route() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/token")).await;
    assert_eq!(res.status, StatusCode::OK);
    let token = res.body["token"].as_str().expect("token string").to_string();

    let res = send(
        &app,
        get("/api/v1/jwt/profile").header("Authorization", format!("Bearer {token}")),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], "123456");
    assert_eq!(res.body["email"], "user@example.com");
    assert_eq!(res.body["name"], "user");
}

#[tokio::test]
async fn test_jwt_route_rejects_garbage_and_foreign_tokens() {
    let (app, _) = router(test_config());

    let res = send(
        &app,
        get("/api/v1/jwt/profile").header("Authorization", "Bearer not.a.jwt"),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid token");

    let mut other = test_config();
    other.signed_token.secret = "another_secret".into();
    let (other_app, _) = router(other);
    let foreign = send(&other_app, get("/api/v1/token")).await.body["token"]
        .as_str()
        .expect("token string")
        .to_string();

    let res = send(
        &app,
        get("/api/v1/jwt/profile").header("Authorization", format!("Bearer {foreign}")),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_allows_burst_then_denies() {
    let (app, _) = router(test_config());

    for i in 0..10 {
        let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
        assert_eq!(res.status, StatusCode::OK, "request {i}");
    }
    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body, json!({ "error": "Rate limit exceeded" }));
}

#[tokio::test]
async fn test_rate_limit_keys_by_group_and_client() {
    let mut config = test_config();
    config.rate_limit.burst_size = 1;
    config.rate_limit.requests_per_second = 0.01;
    let (app, _) = router(config);

    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);

    // Same client, other group.
    let res = send(&app, get("/api/v1/jwt/profile")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Other client, same group.
    let res = send(
        &app,
        get("/api/v1/apikey/profile")
            .header("X-API-Key", API_KEY)
            .header("x-real-ip", "198.51.100.20"),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_can_be_disabled() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    let (app, _) = router(config);

    for _ in 0..20 {
        let res = send(&app, get("/api/v1/apikey/profile").header("X-API-Key", API_KEY)).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_remote_token_miss_hit_then_miss_after_expiry() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer remote-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-1", "email": "remote@example.com", "name": "Remote User"
        })))
        .mount(&upstream)
        .await;

    let mut config = test_config_with_introspection(format!("{}/user", upstream.uri()));
    config.introspection.cache_ttl_ms = 1000;
    let (app, state) = router(config);
    let request = || get("/api/v1/profile").header("Authorization", "Bearer remote-token");

    let res = send(&app, request()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.cache_header(), Some("MISS"));
    assert_eq!(res.body["id"], "u-1");
    assert_eq!(upstream_calls(&upstream).await, 1);

    let res = send(&app, request()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.cache_header(), Some("HIT"));
    assert_eq!(res.body["email"], "remote@example.com");
    assert_eq!(upstream_calls(&upstream).await, 1);
    assert_eq!(state.cache.len(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let res = send(&app, request()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.cache_header(), Some("MISS"));
    assert_eq!(upstream_calls(&upstream).await, 2);
}

#[tokio::test]
async fn test_remote_token_from_query_parameter() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("access_token", "query-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "q-1", "email": "query@example.com", "name": "Query User"
        })))
        .mount(&upstream)
        .await;

    let (app, _) = router(test_config_with_introspection(format!("{}/user", upstream.uri())));

    let res = send(&app, get("/api/v1/profile?access_token=query-token")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], "q-1");
}

#[tokio::test]
async fn test_login_profile_shape_is_normalized() {
    let upstream = introspection_mock(200, json!({ "id": 42, "login": "octo", "email": "" })).await;
    let (app, _) = router(test_config_with_introspection(format!("{}/user", upstream.uri())));

    let res = send(&app, get("/api/v1/profile").header("Authorization", "token gh")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], "42");
    assert_eq!(res.body["email"], "octo");
}

#[tokio::test]
async fn test_rejected_tokens_are_not_cached() {
    let upstream = introspection_mock(401, json!({ "message": "Bad credentials" })).await;
    let (app, state) = router(test_config_with_introspection(format!("{}/user", upstream.uri())));

    for _ in 0..2 {
        let res = send(&app, get("/api/v1/profile").header("Authorization", "Bearer bad")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.error(), "Invalid token");
        assert_eq!(res.cache_header(), Some("MISS"));
    }
    assert_eq!(upstream_calls(&upstream).await, 2);
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_unparseable_profile_is_a_server_error() {
    let upstream = introspection_mock(200, json!("not a profile")).await;
    let (app, state) = router(test_config_with_introspection(format!("{}/user", upstream.uri())));

    let res = send(&app, get("/api/v1/profile").header("Authorization", "Bearer t")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error(), "Failed to parse profile");
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_unreachable_introspection_is_unavailable() {
    let (app, _) = router(test_config_with_introspection("http://127.0.0.1:1/user".into()));

    let res = send(&app, get("/api/v1/profile").header("Authorization", "Bearer t")).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.error(), "Failed to validate token");
    assert_eq!(res.cache_header(), Some("MISS"));
}

#[tokio::test]
async fn test_missing_introspection_url_is_a_server_error() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/profile").header("Authorization", "Bearer t")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.error(), "Authentication is not configured");
    assert!(res.cache_header().is_none());
}

#[tokio::test]
async fn test_oauth_routes_absent_when_disabled() {
    let (app, _) = router(test_config());

    let res = send(&app, get("/api/v1/oauth/profile").header("Authorization", "Bearer t")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = router(test_config());

    let res = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/apikey/profile")
            .header("Origin", "https://app.example.com")
            .header("Access-Control-Request-Method", "GET")
            .header("Access-Control-Request-Headers", "x-api-key"),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_server_serves_and_shuts_down() {
    use auth_gateway::{HttpServer, Shutdown};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(test_config()).unwrap();
    let task = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/api/v1/apikey/profile"))
        .header("X-API-Key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["id"], "api_user");
    drop(client);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server stops after shutdown")
        .unwrap()
        .unwrap();
}

async fn slow_introspection(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "slow", "email": "slow@example.com", "name": "Slow" }))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_abandoned_validation_never_caches() {
    let upstream = slow_introspection(Duration::from_millis(500)).await;
    let (app, state) = router(test_config_with_introspection(format!("{}/user", upstream.uri())));
    let request = || get("/api/v1/profile").header("Authorization", "Bearer slow-token");

    let abandoned = tokio::time::timeout(Duration::from_millis(50), send(&app, request())).await;
    assert!(abandoned.is_err());

    // Outlive the upstream delay so a detached write would have landed.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(state.cache.is_empty());
    assert!(state.cache.lookup("Bearer slow-token").is_none());

    let res = send(&app, request()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.cache_header(), Some("MISS"));
    assert_eq!(state.cache.len(), 1);
}

#[tokio::test]
async fn test_request_timeout_returns_json_error() {
    let upstream = slow_introspection(Duration::from_secs(3)).await;
    let mut config = test_config_with_introspection(format!("{}/user", upstream.uri()));
    config.timeouts.request_secs = 1;
    config.upstream.timeout_secs = 5;
    let (app, state) = router(config);

    let res = send(&app, get("/api/v1/profile").header("Authorization", "Bearer t")).await;
    assert_eq!(res.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(res.error(), "Request timed out");
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn test_query_tokens_get_their_own_bucket() {
    let mut config = test_config();
    config.rate_limit.burst_size = 1;
    config.rate_limit.requests_per_second = 0.01;
    let (app, _) = router(config);

    // No introspection URL: each admitted request answers 500, a denied one 429.
    let res = send(&app, get("/api/v1/profile?access_token=first")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let res = send(&app, get("/api/v1/profile?access_token=second")).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    let res = send(&app, get("/api/v1/profile?access_token=first")).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
}
