//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, .env, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Loaded exactly once at startup; request paths never read the environment
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiKeyConfig, GatewayConfig, IntrospectionConfig, ListenerConfig, ObservabilityConfig,
    OidcConfig, RateLimitConfig, SignedTokenConfig, TimeoutConfig, TlsConfig, UpstreamConfig,
};
