//! Authentication gateway library.
//!
//! An Axum service that puts rate limiting and pluggable authentication in
//! front of a small set of profile routes. Each route group is bound to one
//! credential scheme at registration: locally signed tokens, a static API
//! key, an OpenID Connect provider, or a remote introspection endpoint whose
//! answers are cached.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use auth::{AuthError, AuthStrategy, Principal};
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
