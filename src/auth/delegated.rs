//! Delegated identity through an OpenID Connect provider's userinfo endpoint.

use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::auth::credential::{self, Credential, CredentialSource, ExtractedCredential};
use crate::auth::{AuthError, AuthStrategy, InvalidReason, Principal, ValidationMeta};
use crate::config::OidcConfig;
use crate::observability::metrics;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";
const SCOPES: &str = "openid profile email";

/// Subset of the provider discovery document this gateway relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub userinfo_endpoint: Url,
    #[serde(default)]
    pub authorization_endpoint: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

impl From<UserInfo> for Principal {
    fn from(info: UserInfo) -> Self {
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .or_else(|| info.preferred_username.clone())
            .unwrap_or_default();
        let name = info
            .name
            .filter(|n| !n.is_empty())
            .or(info.preferred_username)
            .unwrap_or_default();
        Principal {
            id: info.sub,
            email,
            name,
        }
    }
}

pub struct DelegatedIdentityStrategy {
    client: Client,
    config: OidcConfig,
    provider: OnceLock<ProviderMetadata>,
}

impl DelegatedIdentityStrategy {
    pub fn new(client: Client, config: OidcConfig) -> Self {
        Self {
            client,
            config,
            provider: OnceLock::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.provider.get().is_some()
    }

    /// Fetch the provider discovery document. Must complete before any
    /// request is validated; until then `validate` reports the provider as
    /// unavailable.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        if self.is_initialized() {
            return Ok(());
        }

        let issuer = self.config.issuer.trim_end_matches('/');
        let discovery_url = format!("{issuer}/{DISCOVERY_PATH}");
        let started = Instant::now();
        let response = self
            .client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnreachable(e.to_string()))?;
        metrics::record_upstream("oidc_discovery", started);

        if !response.status().is_success() {
            return Err(AuthError::UpstreamRejected(response.status().as_u16()));
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|_| AuthError::ProfileParseFailure)?;

        if metadata.issuer.trim_end_matches('/') != issuer {
            tracing::error!(
                expected = %issuer,
                actual = %metadata.issuer,
                "Identity provider issuer mismatch"
            );
            return Err(AuthError::ConfigurationError("identity provider issuer"));
        }

        tracing::info!(
            issuer = %issuer,
            userinfo = %metadata.userinfo_endpoint,
            "Identity provider initialized"
        );
        // A concurrent initializer may have won; both documents are equivalent.
        let _ = self.provider.set(metadata);
        Ok(())
    }

    /// Authorization-code login URL for the configured client.
    pub fn authorization_url(&self, state: &str) -> Option<Url> {
        let mut url = self.provider.get()?.authorization_endpoint.clone()?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        Some(url)
    }

    async fn userinfo(&self, endpoint: &Url, token: &str) -> Result<Principal, AuthError> {
        let started = Instant::now();
        let response = self
            .client
            .get(endpoint.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Userinfo request failed");
                AuthError::UpstreamUnreachable(e.to_string())
            })?;
        metrics::record_upstream("oidc_userinfo", started);

        if !response.status().is_success() {
            return Err(AuthError::UpstreamRejected(response.status().as_u16()));
        }
        let info: UserInfo = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse userinfo response");
            AuthError::ProfileParseFailure
        })?;
        Ok(info.into())
    }
}

#[async_trait]
impl AuthStrategy for DelegatedIdentityStrategy {
    fn scheme(&self) -> &'static str {
        "delegated_identity"
    }

    fn extract_credential(&self, headers: &HeaderMap, _uri: &Uri) -> Option<ExtractedCredential> {
        let header = credential::header_value(headers, credential::AUTHORIZATION)?;
        let token = credential::strip_bearer(&header);
        if token.is_empty() {
            return None;
        }
        Some(ExtractedCredential::new(
            Credential::Bearer(token.to_string()),
            CredentialSource::Authorization,
        ))
    }

    async fn validate(
        &self,
        credential: &ExtractedCredential,
        _meta: &mut ValidationMeta,
    ) -> Result<Principal, AuthError> {
        let provider = self.provider.get().ok_or(AuthError::ProviderUnavailable)?;
        match &credential.credential {
            Credential::Bearer(token) => self.userinfo(&provider.userinfo_endpoint, token).await,
            _ => Err(InvalidReason::Malformed.into()),
        }
    }
}
