//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, global layers, route groups)
//!     → security::rate_limit (per route group)
//!     → middleware/authenticate.rs (strategy bound to the group)
//!     → handlers.rs (ping, health, token, profile)
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::X_TOKEN_CACHE;
pub use server::{build_router, AppState, HttpServer, ServerError};
