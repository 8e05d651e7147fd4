//! Application startup and lifecycle management.

use crate::config::{BlogConfig, CorsConfig};
use crate::handlers;
use crate::services::providers::{self, TextProvider};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit, SharedRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{http_trace_layer, request_id_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BlogConfig>,
    pub text_provider: Arc<dyn TextProvider>,
    pub rate_limiter: SharedRateLimiter,
}

impl AppState {
    /// State with the limiter described by `config.rate_limit`.
    pub fn new(config: BlogConfig, text_provider: Arc<dyn TextProvider>) -> Result<Self, AppError> {
        let rate_limiter = create_ip_rate_limiter(
            config.rate_limit.strategy,
            config.rate_limit.requests,
            config.rate_limit.window(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            text_provider,
            rate_limiter,
        })
    }
}

fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, AppError> {
    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "invalid CORS origin '{}': {}",
            config.allowed_origin,
            e
        ))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Build the HTTP router. Only `/generate` is rate limited.
pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let rate_limit = IpRateLimit::new(state.rate_limiter.clone())
        .trust_forwarded_for(state.config.rate_limit.trust_forwarded_for);

    let generate_route = Router::new()
        .route("/generate", post(handlers::generate::generate))
        .layer(DefaultBodyLimit::max(handlers::generate::MAX_REQUEST_BODY_BYTES))
        .layer(from_fn_with_state(rate_limit, ip_rate_limit_middleware));

    let cors = cors_layer(&state.config.cors)?;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(generate_route)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(http_trace_layer())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the provider named in configuration.
    pub async fn build(config: BlogConfig) -> Result<Self, AppError> {
        let text_provider = providers::from_config(&config.provider)?;

        tracing::info!(
            provider = text_provider.name(),
            model = %config.provider.model,
            credential_present = config.provider.api_key.is_some(),
            "Initialized text provider"
        );

        Self::build_with_provider(config, text_provider).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: BlogConfig,
        text_provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        // Port 0 binds a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let state = AppState::new(config, text_provider)?;
        let router = build_router(state)?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Blog service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
