//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and URLs. All
//! errors are collected rather than stopping at the first one.
//!
//! Absent credentials (signing secret, API key, introspection URL) are not
//! errors here: the affected routes answer 500 per request instead.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// Longest accepted signed-token lifetime: one year.
pub const MAX_TOKEN_LIFETIME_MINUTES: u64 = 365 * 24 * 60;

/// Longest accepted cache freshness window: one year.
pub const MAX_CACHE_TTL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be > 0"));
    }

    let rps = config.rate_limit.requests_per_second;
    if !(rps.is_finite() && rps > 0.0) {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be a positive number",
        ));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be >= 1"));
    }
    if config.rate_limit.max_clients == 0 {
        errors.push(ValidationError::new("rate_limit.max_clients", "must be >= 1"));
    }

    if config.signed_token.lifetime_minutes == 0
        || config.signed_token.lifetime_minutes > MAX_TOKEN_LIFETIME_MINUTES
    {
        errors.push(ValidationError::new(
            "signed_token.lifetime_minutes",
            format!("must be between 1 and {MAX_TOKEN_LIFETIME_MINUTES}"),
        ));
    }

    let cache_ttl_ms = config.introspection.cache_ttl_ms;
    if cache_ttl_ms == 0 || cache_ttl_ms > MAX_CACHE_TTL_MS {
        errors.push(ValidationError::new(
            "introspection.cache_ttl_ms",
            format!("must be between 1 and {MAX_CACHE_TTL_MS}"),
        ));
    }
    if config.introspection.max_entries == 0 {
        errors.push(ValidationError::new(
            "introspection.max_entries",
            "must be >= 1",
        ));
    }
    if let Some(url) = &config.introspection.url {
        if Url::parse(url).is_err() {
            errors.push(ValidationError::new(
                "introspection.url",
                format!("{url:?} is not a valid URL"),
            ));
        }
    }

    if config.oidc.enabled && Url::parse(&config.oidc.issuer).is_err() {
        errors.push(ValidationError::new(
            "oidc.issuer",
            format!("{:?} is not a valid URL", config.oidc.issuer),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names of credentials that are unset and will make their routes fail.
pub fn unconfigured_settings(config: &GatewayConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.signed_token.secret.is_empty() {
        missing.push("signed_token.secret (JWT_SECRET)");
    }
    if config.api_key.valid_key.is_empty() {
        missing.push("api_key.valid_key (VALID_API_KEY)");
    }
    if config.introspection.url.is_none() {
        missing.push("introspection.url (TOKEN_URL)");
    }
    missing
}
