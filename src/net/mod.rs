//! Network layer subsystem.
//!
//! Listeners are plain Tokio TCP sockets; TLS is optional and terminated by
//! axum-server with rustls when `listener.tls` is configured.

pub mod tls;
