use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use auth_gateway::config::{load_config, validation::unconfigured_settings};
use auth_gateway::lifecycle::{signals::shutdown_on_signal, Shutdown};
use auth_gateway::observability::{logging, metrics};
use auth_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "auth-gateway")]
#[command(about = "Rate-limited authentication gateway", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults plus environment apply without one.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("auth-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit_enabled = config.rate_limit.enabled,
        oidc_enabled = config.oidc.enabled,
        "Configuration loaded"
    );
    for setting in unconfigured_settings(&config) {
        tracing::warn!(setting, "Not configured, routes depending on it will answer 500");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
