//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared service objects (`AppState`) from configuration
//! - Create the Axum router with every route group bound to its strategy
//! - Wire up middleware (request id, tracing, CORS, timeout, rate limit)
//! - Serve plain TCP or TLS with graceful shutdown
//! - Drive background maintenance (token cache sweeper)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    routing::get,
    BoxError, Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::Url;

use crate::auth::{
    ApiKeyStrategy, AuthStrategy, DelegatedIdentityStrategy, RemoteTokenStrategy,
    SignedTokenStrategy, TokenCache,
};
use crate::config::GatewayConfig;
use crate::http::{handlers, middleware::authenticate};
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};

/// Time given to in-flight TLS connections once shutdown starts.
const TLS_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid introspection URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub cache: Arc<TokenCache>,
    pub limiter: Arc<RateLimiter>,
    pub signed: Arc<SignedTokenStrategy>,
    pub api_key: Arc<ApiKeyStrategy>,
    pub remote: Arc<RemoteTokenStrategy>,
    pub delegated: Option<Arc<DelegatedIdentityStrategy>>,
}

impl AppState {
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self, ServerError> {
        let mut builder = reqwest::Client::builder().timeout(config.upstream.timeout());
        if !config.upstream.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        let introspection_url = config
            .introspection
            .url
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        let cache = Arc::new(TokenCache::from_config(&config.introspection));
        let remote = RemoteTokenStrategy::new(client.clone(), introspection_url, cache.clone())
            .with_ttl(config.introspection.cache_ttl());
        let delegated = config
            .oidc
            .enabled
            .then(|| Arc::new(DelegatedIdentityStrategy::new(client, config.oidc.clone())));

        Ok(Self {
            cache,
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            signed: Arc::new(SignedTokenStrategy::from_config(&config.signed_token)),
            api_key: Arc::new(ApiKeyStrategy::new(config.api_key.valid_key.clone())),
            remote: Arc::new(remote),
            delegated,
            config,
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let state = AppState::new(Arc::new(config))?;
        let router = build_router(state.clone());
        Ok(Self { router, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let config = self.state.config.clone();

        if let Some(provider) = &self.state.delegated {
            if let Err(e) = provider.initialize().await {
                tracing::error!(
                    issuer = %config.oidc.issuer,
                    error = %e,
                    "Identity provider discovery failed, delegated identity routes will answer 503"
                );
            }
        }

        tokio::spawn(
            self.state
                .cache
                .clone()
                .run_sweeper(config.introspection.sweep_interval(), shutdown.subscribe()),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &config.listener.tls {
            Some(tls) => {
                let rustls = load_tls(tls).await?;
                tracing::info!(address = %addr, "HTTPS server starting");

                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                let mut rx = shutdown.subscribe();
                tokio::spawn(async move {
                    let _ = rx.recv().await;
                    drain.graceful_shutdown(Some(TLS_DRAIN_GRACE));
                });

                axum_server::tls_rustls::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                let mut rx = shutdown.subscribe();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = rx.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health))
        .route("/token", get(handlers::issue_token))
        .merge(protected_group(&state, "/jwt/profile", "jwt", state.signed.clone()))
        .merge(protected_group(&state, "/apikey/profile", "apikey", state.api_key.clone()))
        .merge(protected_group(&state, "/profile", "profile", state.remote.clone()));

    if let Some(provider) = state.delegated.clone() {
        api = api
            .route("/oauth/login", get(handlers::oauth_login))
            .merge(protected_group(&state, "/oauth/profile", "oauth", provider));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);
    let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

    Router::new().nest("/api/v1", api).with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors)
            .layer(HandleErrorLayer::new(handle_layer_error))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}

/// Turn middleware failures into the same JSON error shape handlers use.
async fn handle_layer_error(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "Request timed out" })),
        );
    }
    tracing::error!(error = %err, "Unhandled middleware error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
}

/// Profile route bound to one strategy. The limiter, when enabled, wraps
/// authentication so denied requests never reach the strategy.
fn protected_group(
    state: &AppState,
    path: &str,
    group: &'static str,
    strategy: Arc<dyn AuthStrategy>,
) -> Router<AppState> {
    let router = Router::new()
        .route(path, get(handlers::profile))
        .route_layer(middleware::from_fn_with_state(strategy, authenticate));

    if !state.config.rate_limit.enabled {
        return router;
    }
    let limit = RateLimitState {
        limiter: state.limiter.clone(),
        group,
    };
    router.route_layer(middleware::from_fn_with_state(limit, rate_limit_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_rejects_bad_introspection_url() {
        let mut config = GatewayConfig::default();
        config.introspection.url = Some("not a url".into());
        assert!(matches!(
            AppState::new(Arc::new(config)),
            Err(ServerError::Url(_))
        ));
    }

    #[test]
    fn test_delegated_strategy_only_when_enabled() {
        let state = AppState::new(Arc::new(GatewayConfig::default())).unwrap();
        assert!(state.delegated.is_none());

        let mut config = GatewayConfig::default();
        config.oidc.enabled = true;
        let state = AppState::new(Arc::new(config)).unwrap();
        assert!(state.delegated.is_some());
    }
}
