//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on a protected route group:
//!     → rate_limit.rs (per ip + credential bucket, 429 on denial)
//!     → auth (credential extraction and validation)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before authentication, so rejected floods never
//!   reach the introspection endpoint
//! - Fail closed: no credential, no principal

pub mod rate_limit;

pub use rate_limit::{RateLimitState, RateLimiter};
