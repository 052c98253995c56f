//! Opaque bearer tokens validated against a remote introspection endpoint.
//!
//! # State machine (per request)
//! ```text
//! NoCredential                         → Unauthorized
//! Credential + cache hit               → Authorized            (HIT)
//! Credential + cache miss/expired      → RemoteValidating      (MISS)
//!     RemoteValidating → 200 + parse   → Authorized + store
//!     RemoteValidating → non-200       → Unauthorized
//!     RemoteValidating → transport err → ServiceUnavailable
//! ```
//!
//! The store happens after the upstream future resolves. A request that is
//! dropped mid-flight never reaches it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::auth::credential::{self, Credential, CredentialSource, ExtractedCredential};
use crate::auth::{AuthError, AuthStrategy, CacheStatus, Principal, TokenCache, ValidationMeta};
use crate::observability::metrics;

pub struct RemoteTokenStrategy {
    client: Client,
    introspection_url: Option<Url>,
    cache: Arc<TokenCache>,
    ttl: Duration,
}

impl RemoteTokenStrategy {
    /// Cached validations use the cache's default TTL unless overridden with
    /// [`with_ttl`](Self::with_ttl).
    pub fn new(client: Client, introspection_url: Option<Url>, cache: Arc<TokenCache>) -> Self {
        let ttl = cache.default_ttl();
        Self {
            client,
            introspection_url,
            cache,
            ttl,
        }
    }

    /// Override the freshness window for tokens validated by this instance.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    async fn introspect(
        &self,
        url: &Url,
        token: &str,
        source: CredentialSource,
    ) -> Result<Principal, AuthError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .header(source.name(), token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Introspection request failed");
                AuthError::UpstreamUnreachable(e.to_string())
            })?;
        metrics::record_upstream("introspection", started);

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "Introspection rejected token");
            return Err(AuthError::UpstreamRejected(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read introspection response");
            AuthError::UpstreamUnreachable(e.to_string())
        })?;
        parse_profile(&body)
    }
}

#[async_trait]
impl AuthStrategy for RemoteTokenStrategy {
    fn scheme(&self) -> &'static str {
        "remote_token"
    }

    fn extract_credential(&self, headers: &HeaderMap, uri: &Uri) -> Option<ExtractedCredential> {
        credential::by_precedence(headers, uri)
            .map(|(token, source)| ExtractedCredential::new(Credential::Bearer(token), source))
    }

    async fn validate(
        &self,
        credential: &ExtractedCredential,
        meta: &mut ValidationMeta,
    ) -> Result<Principal, AuthError> {
        let url = self
            .introspection_url
            .as_ref()
            .ok_or(AuthError::ConfigurationError("introspection URL"))?;
        let token = credential.value();

        if let Some(principal) = self.cache.lookup(token) {
            meta.cache = Some(CacheStatus::Hit);
            metrics::record_cache_lookup("hit");
            return Ok(principal);
        }
        meta.cache = Some(CacheStatus::Miss);
        metrics::record_cache_lookup("miss");

        let principal = self.introspect(url, token, credential.source).await?;
        self.cache.store(token, principal.clone(), self.ttl);
        Ok(principal)
    }
}

/// Canonical profile shape. Missing or null fields read as empty.
#[derive(Debug, Deserialize)]
struct CanonicalProfile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Provider shape with a numeric id and a separate login handle.
#[derive(Debug, Deserialize)]
struct LoginProfile {
    id: u64,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Decode an introspection body into a [`Principal`], trying the canonical
/// schema first and the login-based schema second.
pub fn parse_profile(body: &[u8]) -> Result<Principal, AuthError> {
    if let Ok(profile) = serde_json::from_slice::<CanonicalProfile>(body) {
        return Ok(Principal {
            id: profile.id.unwrap_or_default(),
            email: profile.email.unwrap_or_default(),
            name: profile.name.unwrap_or_default(),
        });
    }

    let profile: LoginProfile = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse introspection profile");
        AuthError::ProfileParseFailure
    })?;
    let email = profile
        .email
        .filter(|e| !e.is_empty())
        .or(profile.login)
        .unwrap_or_default();
    Ok(Principal {
        id: profile.id.to_string(),
        email,
        name: profile.name.unwrap_or_default(),
    })
}
