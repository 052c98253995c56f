//! Static API key scheme.

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use subtle::ConstantTimeEq;

use crate::auth::credential::{self, Credential, CredentialSource, ExtractedCredential};
use crate::auth::{AuthError, AuthStrategy, InvalidReason, Principal, ValidationMeta};

/// Accepts exactly one configured key and maps it to the service account.
pub struct ApiKeyStrategy {
    valid_key: String,
}

impl ApiKeyStrategy {
    pub fn new(valid_key: impl Into<String>) -> Self {
        Self {
            valid_key: valid_key.into(),
        }
    }

    /// The identity every valid key resolves to.
    pub fn service_principal() -> Principal {
        Principal::new("api_user", "api@example.com", "API User")
    }

    pub fn check(&self, key: &str) -> Result<Principal, AuthError> {
        if self.valid_key.is_empty() {
            return Err(AuthError::ConfigurationError("API key"));
        }
        if bool::from(self.valid_key.as_bytes().ct_eq(key.as_bytes())) {
            Ok(Self::service_principal())
        } else {
            Err(InvalidReason::InvalidKey.into())
        }
    }
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
    fn scheme(&self) -> &'static str {
        "api_key"
    }

    fn extract_credential(&self, headers: &HeaderMap, _uri: &Uri) -> Option<ExtractedCredential> {
        credential::header_value(headers, credential::X_API_KEY).map(|key| {
            ExtractedCredential::new(Credential::ApiKey(key), CredentialSource::ApiKeyHeader)
        })
    }

    async fn validate(
        &self,
        credential: &ExtractedCredential,
        _meta: &mut ValidationMeta,
    ) -> Result<Principal, AuthError> {
        match &credential.credential {
            Credential::ApiKey(key) => self.check(key),
            _ => Err(InvalidReason::Malformed.into()),
        }
    }
}
