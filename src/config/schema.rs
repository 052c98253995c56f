//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Inbound request timeouts.
    pub timeouts: TimeoutConfig,

    /// Outbound call settings shared by introspection and identity provider.
    pub upstream: UpstreamConfig,

    /// Signed (HS256) token settings.
    pub signed_token: SignedTokenConfig,

    /// Static API key settings.
    pub api_key: ApiKeyConfig,

    /// Remote token introspection and validated-token cache.
    pub introspection: IntrospectionConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Delegated identity (OpenID Connect) provider.
    pub oidc: OidcConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one inbound request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Deadline for every outbound validation call, in seconds.
    pub timeout_secs: u64,

    /// Honour HTTP(S)_PROXY from the environment for outbound calls.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            use_system_proxy: true,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignedTokenConfig {
    /// HMAC secret. Empty means signed tokens are not configured.
    pub secret: String,

    /// Lifetime of minted tokens, in minutes.
    pub lifetime_minutes: u64,
}

impl Default for SignedTokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            lifetime_minutes: 24 * 60,
        }
    }
}

impl SignedTokenConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiKeyConfig {
    /// The single accepted key. Empty means API keys are not configured.
    pub valid_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionConfig {
    /// Endpoint queried to validate opaque bearer tokens.
    pub url: Option<String>,

    /// Freshness window of a cached validation, in milliseconds.
    pub cache_ttl_ms: u64,

    /// Upper bound on cached tokens.
    pub max_entries: usize,

    /// Interval of the expired-entry sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            cache_ttl_ms: 300_000,
            max_entries: 100_000,
            sweep_interval_secs: 60,
        }
    }
}

impl IntrospectionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on protected route groups.
    pub enabled: bool,

    /// Refill rate, in tokens per second.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,

    /// Maximum number of tracked client buckets.
    pub max_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 10.0,
            burst_size: 10,
            max_clients: 100_000,
        }
    }
}

/// OpenID Connect provider used for delegated identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Mount the delegated identity route group.
    pub enabled: bool,

    /// Issuer URL; discovery is fetched from `{issuer}/.well-known/openid-configuration`.
    pub issuer: String,

    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: "https://accounts.google.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:8080/auth/callback".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
