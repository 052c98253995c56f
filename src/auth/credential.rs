//! Credential types and extraction from request headers/query.

use axum::http::{HeaderMap, Uri};

pub const AUTHORIZATION: &str = "Authorization";
pub const X_API_KEY: &str = "X-API-Key";
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Where a credential was found. Echoed back when forwarding it upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Authorization,
    ApiKeyHeader,
    QueryParam,
}

impl CredentialSource {
    /// Name of the header (or query parameter) the credential arrived in.
    pub fn name(&self) -> &'static str {
        match self {
            CredentialSource::Authorization => AUTHORIZATION,
            CredentialSource::ApiKeyHeader => X_API_KEY,
            CredentialSource::QueryParam => ACCESS_TOKEN_PARAM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    ApiKey(String),
    SignedToken(String),
}

impl Credential {
    pub fn value(&self) -> &str {
        match self {
            Credential::Bearer(v) | Credential::ApiKey(v) | Credential::SignedToken(v) => v,
        }
    }
}

/// A credential together with its origin on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCredential {
    pub credential: Credential,
    pub source: CredentialSource,
}

impl ExtractedCredential {
    pub fn new(credential: Credential, source: CredentialSource) -> Self {
        Self { credential, source }
    }

    pub fn value(&self) -> &str {
        self.credential.value()
    }
}

/// Non-empty header value as a string.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Non-empty query parameter value.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

/// Raw token in fixed precedence: `Authorization`, then `X-API-Key`, then
/// the `access_token` query parameter.
pub fn by_precedence(headers: &HeaderMap, uri: &Uri) -> Option<(String, CredentialSource)> {
    header_value(headers, AUTHORIZATION)
        .map(|v| (v, CredentialSource::Authorization))
        .or_else(|| header_value(headers, X_API_KEY).map(|v| (v, CredentialSource::ApiKeyHeader)))
        .or_else(|| query_param(uri, ACCESS_TOKEN_PARAM).map(|v| (v, CredentialSource::QueryParam)))
}

/// Strip a case-insensitive `Bearer ` scheme prefix, if present.
pub fn strip_bearer(value: &str) -> &str {
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim_start(),
        _ => value,
    }
}
