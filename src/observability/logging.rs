//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level when set. JSON output is meant
//! for production log shipping; the default format is for terminals.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "auth_gateway={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Mask a credential for logging: keep a short prefix, hide the rest.
pub fn mask_credential(credential: Option<&str>) -> String {
    const VISIBLE: usize = 15;
    match credential {
        None | Some("") => "No Authorization".to_string(),
        Some(value) if value.chars().count() > VISIBLE => {
            let prefix: String = value.chars().take(VISIBLE).collect();
            format!("{prefix}*****")
        }
        Some(_) => "Bearer *****".to_string(),
    }
}
