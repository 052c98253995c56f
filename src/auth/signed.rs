//! Signed (HS256) token scheme.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::credential::{self, Credential, CredentialSource, ExtractedCredential};
use crate::auth::{AuthError, AuthStrategy, InvalidReason, Principal, ValidationMeta};
use crate::config::SignedTokenConfig;

/// Claims carried by tokens this gateway mints and accepts.
///
/// `user_id` and `username` are accepted as aliases so tokens minted by
/// older issuers keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(alias = "user_id")]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "username")]
    pub name: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl From<TokenClaims> for Principal {
    fn from(claims: TokenClaims) -> Self {
        Principal {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

pub struct SignedTokenStrategy {
    secret: String,
    lifetime: Duration,
}

impl SignedTokenStrategy {
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            lifetime,
        }
    }

    pub fn from_config(config: &SignedTokenConfig) -> Self {
        Self::new(config.secret.clone(), config.lifetime())
    }

    fn require_secret(&self) -> Result<&[u8], AuthError> {
        if self.secret.is_empty() {
            Err(AuthError::ConfigurationError("signing secret"))
        } else {
            Ok(self.secret.as_bytes())
        }
    }

    /// Mint a token for `principal` valid for the configured lifetime.
    pub fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        let secret = self.require_secret()?;
        let now = now_epoch_seconds();
        let claims = TokenClaims {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            name: principal.name.clone(),
            exp: now.saturating_add(self.lifetime.as_secs()),
            iat: now,
            jti: Some(Uuid::new_v4().to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .map_err(|_| AuthError::ConfigurationError("signing key"))
    }

    /// Check signature and expiry, then decode the claims.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let secret = self.require_secret()?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => InvalidReason::Expired,
                ErrorKind::InvalidSignature => InvalidReason::InvalidSignature,
                _ => InvalidReason::Malformed,
            })?;
        Ok(data.claims.into())
    }
}

#[async_trait]
impl AuthStrategy for SignedTokenStrategy {
    fn scheme(&self) -> &'static str {
        "signed_token"
    }

    fn extract_credential(&self, headers: &HeaderMap, _uri: &Uri) -> Option<ExtractedCredential> {
        let header = credential::header_value(headers, credential::AUTHORIZATION)?;
        let token = credential::strip_bearer(&header);
        if token.is_empty() {
            return None;
        }
        Some(ExtractedCredential::new(
            Credential::SignedToken(token.to_string()),
            CredentialSource::Authorization,
        ))
    }

    async fn validate(
        &self,
        credential: &ExtractedCredential,
        _meta: &mut ValidationMeta,
    ) -> Result<Principal, AuthError> {
        match &credential.credential {
            Credential::SignedToken(token) => self.verify(token),
            _ => Err(InvalidReason::Malformed.into()),
        }
    }
}

fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
