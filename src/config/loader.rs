//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then `.env`, then environment
/// overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    // A missing .env file is the normal case outside development.
    let _ = dotenv::dotenv();

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers can supply a fixed map.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET") {
        config.signed_token.secret = secret;
    }
    if let Some(raw) = lookup("JWT_EXPIRATION_MINUTES") {
        config.signed_token.lifetime_minutes = parse_number("JWT_EXPIRATION_MINUTES", raw)?;
    }
    if let Some(key) = lookup("VALID_API_KEY") {
        config.api_key.valid_key = key;
    }
    if let Some(url) = lookup("TOKEN_URL") {
        config.introspection.url = Some(url).filter(|u| !u.is_empty());
    }
    if let Some(raw) = lookup("TOKEN_CACHE_EXPIRY") {
        let ttl = parse_duration(&raw).ok_or(ConfigError::Env {
            var: "TOKEN_CACHE_EXPIRY",
            value: raw.clone(),
        })?;
        config.introspection.cache_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    }

    // RATE_LIMIT_REQUESTS per RATE_LIMIT_DURATION; the request count doubles as burst.
    let requests = lookup("RATE_LIMIT_REQUESTS")
        .map(|raw| parse_number::<u32>("RATE_LIMIT_REQUESTS", raw))
        .transpose()?;
    let window = lookup("RATE_LIMIT_DURATION")
        .map(|raw| {
            parse_duration(&raw)
                .filter(|d| !d.is_zero())
                .ok_or(ConfigError::Env {
                    var: "RATE_LIMIT_DURATION",
                    value: raw.clone(),
                })
        })
        .transpose()?;
    if requests.is_some() || window.is_some() {
        let requests = requests.unwrap_or(config.rate_limit.burst_size);
        let window = window.unwrap_or(Duration::from_secs(1));
        config.rate_limit.burst_size = requests;
        config.rate_limit.requests_per_second = requests as f64 / window.as_secs_f64();
    }

    if let Some(issuer) = lookup("OIDC_ISSUER") {
        config.oidc.issuer = issuer;
    }
    if let Some(client_id) = lookup("OAUTH_CLIENT_ID") {
        config.oidc.client_id = client_id;
    }
    if let Some(client_secret) = lookup("OAUTH_CLIENT_SECRET") {
        config.oidc.client_secret = client_secret;
    }
    if let Some(redirect_url) = lookup("OAUTH_REDIRECT_URL") {
        config.oidc.redirect_url = redirect_url;
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value: raw })
}

/// Parse a duration written as a sequence of `<number><unit>` terms, e.g.
/// `5m`, `1h30m`, `1.5s`, `250ms`. Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_secs = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total_secs += value * scale;
        rest = &rest[unit_len..];
    }

    Duration::try_from_secs_f64(total_secs).ok()
}
