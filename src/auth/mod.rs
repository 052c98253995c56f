//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers / query
//!     → credential.rs (extract, fixed precedence)
//!     → one AuthStrategy bound to the route group:
//!         signed.rs    (HS256 token, local verification)
//!         api_key.rs   (static key, constant-time compare)
//!         delegated.rs (OIDC userinfo lookup)
//!         remote.rs    (introspection endpoint + cache.rs)
//!     → Principal (canonical identity, inserted into request extensions)
//! ```
//!
//! # Design Decisions
//! - Every strategy normalizes to `Principal` itself; handlers never learn
//!   which scheme authenticated the request
//! - Scheme is bound at route registration, never guessed from the credential
//! - Only successful validations are cached

pub mod api_key;
pub mod cache;
pub mod credential;
pub mod delegated;
pub mod error;
pub mod remote;
pub mod signed;

use async_trait::async_trait;
use axum::http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};

pub use api_key::ApiKeyStrategy;
pub use cache::TokenCache;
pub use credential::{Credential, CredentialSource, ExtractedCredential};
pub use delegated::DelegatedIdentityStrategy;
pub use error::{AuthError, InvalidReason};
pub use remote::RemoteTokenStrategy;
pub use signed::SignedTokenStrategy;

/// Canonical, scheme-independent identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

/// Outcome of the token cache consultation, surfaced as `X-Token-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Response metadata a strategy hands back alongside its verdict.
#[derive(Debug, Clone, Default)]
pub struct ValidationMeta {
    pub cache: Option<CacheStatus>,
}

/// One authentication scheme.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Label used in logs and metrics.
    fn scheme(&self) -> &'static str;

    fn extract_credential(&self, headers: &HeaderMap, uri: &Uri) -> Option<ExtractedCredential>;

    async fn validate(
        &self,
        credential: &ExtractedCredential,
        meta: &mut ValidationMeta,
    ) -> Result<Principal, AuthError>;
}
