//! Authentication failure taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a presented credential was refused locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("API key mismatch")]
    InvalidKey,
    #[error("credential is not in the expected format")]
    Malformed,
}

/// Errors produced while resolving a request to a [`Principal`](super::Principal).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential presented")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(InvalidReason),

    /// Introspection endpoint or identity provider answered non-success.
    #[error("upstream rejected credential with status {0}")]
    UpstreamRejected(u16),

    /// Network or transport failure talking to an upstream.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Upstream body matched neither known profile schema.
    #[error("upstream profile matched no known schema")]
    ProfileParseFailure,

    /// Identity provider discovery has not completed.
    #[error("identity provider not initialized")]
    ProviderUnavailable,

    /// A required secret or URL is absent.
    #[error("{0} is not configured")]
    ConfigurationError(&'static str),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidCredential(_)
            | AuthError::UpstreamRejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::UpstreamUnreachable(_) | AuthError::ProviderUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthError::ProfileParseFailure | AuthError::ConfigurationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Never carries upstream bodies or config values.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "Missing authentication credential",
            AuthError::InvalidCredential(InvalidReason::Expired) => "Token expired",
            AuthError::InvalidCredential(InvalidReason::InvalidKey) => "Invalid API key",
            AuthError::InvalidCredential(_) | AuthError::UpstreamRejected(_) => "Invalid token",
            AuthError::UpstreamUnreachable(_) => "Failed to validate token",
            AuthError::ProfileParseFailure => "Failed to parse profile",
            AuthError::ProviderUnavailable => "Identity provider unavailable",
            AuthError::ConfigurationError(_) => "Authentication is not configured",
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidCredential(_) => "invalid_credential",
            AuthError::UpstreamRejected(_) => "upstream_rejected",
            AuthError::UpstreamUnreachable(_) => "upstream_unreachable",
            AuthError::ProfileParseFailure => "profile_parse_failure",
            AuthError::ProviderUnavailable => "provider_unavailable",
            AuthError::ConfigurationError(_) => "configuration_error",
        }
    }
}

impl From<InvalidReason> for AuthError {
    fn from(reason: InvalidReason) -> Self {
        AuthError::InvalidCredential(reason)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}
