//! TLS configuration and certificate loading.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the rustls server configuration for the listener.
pub async fn load_tls(config: &TlsConfig) -> Result<RustlsConfig, io::Error> {
    let cert = Path::new(&config.cert_path);
    let key = Path::new(&config.key_path);
    require_file(cert, "Certificate")?;
    require_file(key, "Private key")?;

    tracing::debug!(cert = %cert.display(), key = %key.display(), "Loading TLS material");
    RustlsConfig::from_pem_file(cert, key).await
}

fn require_file(path: &Path, what: &str) -> Result<(), io::Error> {
    if path.is_file() {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{what} file not found: {}", path.display()),
    ))
}
