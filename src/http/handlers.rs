use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthError, Principal};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

/// Mint a signed token for the demo user.
pub async fn issue_token(State(state): State<AppState>) -> Result<Json<TokenResponse>, AuthError> {
    let demo = Principal::new("123456", "user@example.com", "user");
    let token = state.signed.issue(&demo).inspect_err(|e| {
        tracing::error!(error = %e, "Failed to issue signed token");
    })?;
    Ok(Json(TokenResponse { token }))
}

/// Echo back whoever the route group's strategy resolved.
pub async fn profile(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

/// Redirect to the identity provider's authorization endpoint.
pub async fn oauth_login(State(state): State<AppState>) -> Response {
    let url = state
        .delegated
        .as_ref()
        .and_then(|provider| provider.authorization_url(&Uuid::new_v4().to_string()));
    match url {
        Some(url) => Redirect::temporary(url.as_str()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": AuthError::ProviderUnavailable.public_message() })),
        )
            .into_response(),
    }
}
