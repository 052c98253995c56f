//! Authentication middleware.
//! Runs the route group's strategy and attaches the resolved principal.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{AuthError, AuthStrategy, ValidationMeta};
use crate::observability::metrics;

pub const X_TOKEN_CACHE: HeaderName = HeaderName::from_static("x-token-cache");

pub async fn authenticate(
    State(strategy): State<Arc<dyn AuthStrategy>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let scheme = strategy.scheme();
    let mut meta = ValidationMeta::default();

    let outcome = match strategy.extract_credential(req.headers(), req.uri()) {
        Some(credential) => strategy.validate(&credential, &mut meta).await,
        None => Err(AuthError::MissingCredential),
    };

    let mut response = match outcome {
        Ok(principal) => {
            metrics::record_auth(scheme, "success");
            tracing::debug!(scheme, principal = %principal.id, "Request authenticated");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => {
            metrics::record_auth(scheme, err.kind());
            match &err {
                AuthError::ConfigurationError(_) => {
                    tracing::error!(scheme, error = %err, "Authentication misconfigured")
                }
                AuthError::UpstreamUnreachable(_)
                | AuthError::ProviderUnavailable
                | AuthError::ProfileParseFailure => {
                    tracing::warn!(scheme, error = %err, "Authentication backend failure")
                }
                _ => tracing::info!(scheme, error = %err, "Authentication failed"),
            }
            err.into_response()
        }
    };

    if let Some(status) = meta.cache {
        response
            .headers_mut()
            .insert(X_TOKEN_CACHE, HeaderValue::from_static(status.as_str()));
    }
    response
}
